//! Translation of one gear into a [Translation] record.
use gearc_frontend::Program;
use gearc_ir::{
    FuncBlock, Session, TranslateConfig, Translation, from_ast,
};
use gearc_opt::{Unit, pipeline::Pipeline};
use gearc_utils::{Error, GPosIdx, GearcResult};
use itertools::Itertools;

/// Translate the top gear of `program` selected by `config`.
pub fn translate(program: &Program, config: TranslateConfig) -> GearcResult<Translation> {
    let gear = match config.top {
        Some(top) => program
            .find_gear(top)
            .ok_or_else(|| Error::undefined(top, "gear"))?,
        None => program
            .gears
            .last()
            .ok_or_else(|| Error::misc("the program defines no gears"))?,
    };
    let mut sess = Session::new(program, config);
    sess.push_frame(gear.name, GPosIdx::UNKNOWN);
    let res = translate_gear(&mut sess, gear).map_err(|e| sess.contextualize(e));
    sess.pop_frame();
    res
}

fn translate_gear(
    sess: &mut Session,
    gear: &gearc_frontend::ast::GearDef,
) -> GearcResult<Translation> {
    let overrides = sess.config.params.clone();
    let (ctx, body) = from_ast::lower_gear(sess, gear, &overrides)?;
    let dump_ir = sess.config.dump_ir;

    let funcs = translate_funcs(sess, dump_ir)?;

    let mut unit = Unit::new(ctx, body);
    unit.funcs = funcs;
    log::info!("translating gear `{}'", unit.ctx.name);
    Pipeline::gear()?.execute(&mut unit, dump_ir)?;
    build(unit)
}

/// Run the function pipeline on every helper translated so far.
fn translate_funcs(sess: &mut Session, dump_ir: bool) -> GearcResult<Vec<FuncBlock>> {
    let pipeline = Pipeline::func()?;
    sess.take_funcs()
        .into_iter()
        .map(|tf| {
            let mut block = tf.block;
            log::info!("translating helper `{}'", block.name);
            let mut unit = Unit::new(tf.ctx, std::mem::take(&mut block.stmts));
            pipeline.execute(&mut unit, dump_ir)?;
            block.stmts = unit.body.stmts;
            Ok(block)
        })
        .collect()
}

/// Assemble the translation record from an optimized gear.
fn build(unit: Unit) -> GearcResult<Translation> {
    let Unit {
        ctx,
        body,
        funcs,
        registers,
        states,
        ..
    } = unit;
    let rst_cond = ctx
        .rst_cond
        .ok_or_else(|| Error::misc(format!("gear `{}' was not scheduled", ctx.name)))?;
    let variables = ctx
        .variables()
        .filter(|v| !v.is_reg())
        .cloned()
        .collect_vec();
    log::info!(
        "`{}': {} state(s), registers {{{}}}",
        ctx.name,
        states,
        registers.iter().map(|r| r.name).join(", ")
    );
    Ok(Translation {
        name: ctx.name,
        params: ctx.params(),
        body,
        registers,
        interfaces: ctx.interfaces().cloned().collect(),
        variables,
        funcs,
        submodules: ctx.submodules,
        state_reg: ctx.state_reg,
        states,
        rst_cond,
    })
}
