use crate::Id;
use std::collections::{HashMap, HashSet};

/// Generates fresh names per prefix, avoiding every name it was told
/// about or already handed out.
#[derive(Clone, Debug, Default)]
pub struct NameGenerator {
    name_hash: HashMap<Id, i64>,
    generated_names: HashSet<Id>,
}

impl NameGenerator {
    /// Create a NameGenerator that never generates any of `names`.
    pub fn with_prev_defined_names(names: HashSet<Id>) -> Self {
        NameGenerator {
            generated_names: names,
            name_hash: HashMap::default(),
        }
    }

    /// Reserve a user-visible name.
    pub fn add_name(&mut self, name: Id) {
        self.generated_names.insert(name);
    }

    /// Returns a name that starts with `prefix`: the prefix itself when it
    /// is unused, then `prefix_0`, `prefix_1`, ...
    pub fn gen_name<S>(&mut self, prefix: S) -> Id
    where
        S: Into<Id>,
    {
        let mut cur_prefix: Id = prefix.into();
        loop {
            let count = self
                .name_hash
                .entry(cur_prefix)
                .and_modify(|v| *v += 1)
                .or_insert(-1);

            let name = if *count == -1 {
                cur_prefix
            } else {
                Id::new(format!("{}_{}", cur_prefix, count))
            };

            if self.generated_names.insert(name) {
                return name;
            }
            cur_prefix = name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avoids_reserved_names() {
        let mut namegen = NameGenerator::default();
        namegen.add_name("x".into());
        let a = namegen.gen_name("x");
        let b = namegen.gen_name("x");
        assert_ne!(a, "x");
        assert_ne!(a, b);
        assert_eq!(namegen.gen_name("_eot"), "_eot");
    }
}
