use gearc::driver;
use gearc_utils::GearcResult;

fn main() -> GearcResult<()> {
    driver::run_compiler()
}
