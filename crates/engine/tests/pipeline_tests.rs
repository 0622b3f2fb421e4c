use fpipe_engine::{
    Args, Condition, ConditionFn, PipelineError, Record, Step, StepFn, Term, Value, VariableContext, and_, args,
    conditionfn, context, context_fields, eval_vars, if_, not_, or_, pipeline, stepfn, store, variables,
};
use indexmap::IndexMap;

#[derive(Debug, Default)]
struct Ctx {
    value: Value,
    result: Value,
    trace: Vec<Value>,
}

context_fields!(Ctx { value, result, trace });

impl Ctx {
    fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

fn tstep() -> StepFn<Ctx> {
    stepfn("tstep", |ctx: &mut Ctx, args: Args| {
        let (positional, keyword) = args.into_parts();
        let mut entry = positional;
        entry.push(Value::Map(keyword));
        ctx.trace.push(Value::Tuple(entry));
        Ok(Value::Null)
    })
}

fn ok() -> Step<Ctx> {
    stepfn("ok", |_: &mut Ctx, _| Ok(Value::from("OK"))).step(())
}

fn fail() -> Step<Ctx> {
    stepfn("fail", |_: &mut Ctx, _| Ok(Value::from("Failed"))).step(())
}

fn has_value() -> ConditionFn<Ctx> {
    conditionfn("has_value", |ctx: &mut Ctx, args: Args| Ok(&ctx.value == args.require(0)?))
}

fn yes() -> Condition<Ctx> {
    conditionfn("true", |_: &mut Ctx, _| Ok(true)).condition(())
}

fn no() -> Condition<Ctx> {
    conditionfn("false", |_: &mut Ctx, _| Ok(false)).condition(())
}

fn check(condition: Condition<Ctx>) -> bool {
    condition.call(&mut Ctx::default()).expect("condition runs")
}

#[test]
fn step_captures_positional_and_keyword_args() {
    let mut ctx = Ctx::default();
    tstep().step(args![1, 2, 3; a = 4, b = 5]).call(&mut ctx).expect("step runs");
    assert_eq!(
        ctx.trace,
        vec![Value::tuple([Value::Int(1), Value::Int(2), Value::Int(3), Value::map([("a", 4), ("b", 5)])])]
    );
}

#[test]
fn condition_captures_args() {
    assert!(has_value().condition([7]).call(&mut Ctx::with_value(7)).expect("runs"));
    assert!(!has_value().condition([7]).call(&mut Ctx::default()).expect("runs"));
}

#[test]
fn builders_name_their_steps() {
    assert_eq!(tstep().step([7, 8]).name(), "tstep");
    assert_eq!(has_value().condition([7]).name(), "has_value");
}

#[test]
fn simple_pipeline_runs_in_order() {
    let mut ctx = Ctx::default();
    pipeline([tstep().step([7]), tstep().step([78])]).call(&mut ctx).expect("pipeline runs");
    assert_eq!(
        ctx.trace,
        vec![
            Value::tuple([Value::Int(7), Value::map(Vec::<(String, Value)>::new())]),
            Value::tuple([Value::Int(78), Value::map(Vec::<(String, Value)>::new())]),
        ]
    );
}

#[test]
fn if_selects_the_branch() {
    let mut ctx = Ctx::default();
    assert_eq!(if_(yes(), ok(), None).call(&mut ctx).expect("runs"), Value::from("OK"));
    assert_eq!(if_(no(), ok(), None).call(&mut ctx).expect("runs"), Value::Null);
    assert_eq!(if_(yes(), ok(), fail()).call(&mut ctx).expect("runs"), Value::from("OK"));
    assert_eq!(if_(no(), fail(), ok()).call(&mut ctx).expect("runs"), Value::from("OK"));
}

#[test]
fn not_inverts() {
    assert!(!check(not_(yes())));
    assert!(check(not_(no())));
}

#[test]
fn or_truth_table() {
    assert!(!check(or_(Vec::new())));
    assert!(check(or_([yes()])));
    assert!(!check(or_([no()])));
    assert!(check(or_([yes(), no()])));
    assert!(check(or_([no(), yes()])));
    assert!(check(or_([yes(), yes()])));
    assert!(!check(or_([no(), no()])));
}

#[test]
fn and_truth_table() {
    assert!(check(and_(Vec::new())));
    assert!(check(and_([yes()])));
    assert!(!check(and_([no()])));
    assert!(!check(and_([yes(), no()])));
    assert!(!check(and_([no(), yes()])));
    assert!(check(and_([yes(), yes()])));
    assert!(!check(and_([no(), no()])));
}

#[test]
fn scope_is_closed_after_variables() {
    let mut kept = None;
    variables(|scope| {
        scope.variables(["v1", "v2"])?;
        scope.attributes(["value", "a2"])?;
        kept = Some(scope.find("v1").expect("minted"));
        Ok(())
    })
    .expect("body succeeds");
    assert!(kept.expect("captured").is_closed());
}

#[test]
fn closed_scope_holds_nothing() {
    let scope = VariableContext::new();
    scope.variables(["v1", "v2"]).expect("open");
    scope.attributes(["value", "a2"]).expect("open");
    assert_eq!(scope.len(), 4);
    scope.close();
    assert_eq!(scope.len(), 0);
}

#[test]
fn scope_records_names_in_creation_order() {
    let names = variables(|scope| {
        scope.variables(["v1", "v2"])?;
        scope.attributes(["a1", "a2"])?;
        Ok(scope.names())
    })
    .expect("body succeeds");
    assert_eq!(names, vec!["v1", "v2", "a1", "a2"]);
}

#[test]
fn attribute_reads_the_context_field() {
    let ctx = Ctx::with_value(7);
    let value = variables(|scope| scope.attribute("value")?.value(&ctx)).expect("field present");
    assert_eq!(value, Value::Int(7));
}

#[test]
fn returning_a_bare_handle_fails() {
    let leak_attribute = stepfn("leak_attribute", |_: &mut Ctx, _| {
        variables(|scope| Ok(Value::from(scope.attribute("value")?)))
    });
    let error = leak_attribute.step(()).call(&mut Ctx::with_value(55)).expect_err("handle leaked");
    assert!(matches!(error, PipelineError::LeakedHandle { ref name, .. } if name == "value"));

    let leak_variable = stepfn("leak_variable", |_: &mut Ctx, _| {
        variables(|scope| Ok(Value::from(scope.variable("value")?)))
    });
    assert!(leak_variable.step(()).call(&mut Ctx::with_value(55)).is_err());
}

#[test]
fn variables_carry_values_between_reads() {
    let result = variables(|scope| {
        let [v1, v2] = scope.variables(["v1", "v2"])?;
        v1.set_value("a")?;
        v2.set_value(v1.value()?)?;
        v2.value()
    })
    .expect("values stored");
    assert_eq!(result, Value::from("a"));
}

#[test]
fn unset_variable_read_fails() {
    let error = variables(|scope| scope.variable("never")?.value()).expect_err("unset");
    assert!(matches!(error, PipelineError::UnsetVariable { ref name } if name == "never"));
}

#[test]
fn store_returns_the_stored_value() {
    let mut ctx = Ctx::with_value(7);
    let result = variables(|scope| {
        let [value, result] = scope.attributes(["value", "result"])?;
        scope.pipeline([store(&result, &value).into()])?.call(&mut ctx)
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::Int(7));
}

#[test]
fn store_writes_the_context_field() {
    let mut ctx = Ctx::with_value(72);
    variables(|scope| {
        let [value, result] = scope.attributes(["value", "result"])?;
        let inspect = Step::new("inspect", |ctx: &mut Ctx| Ok(ctx.result.clone()));
        scope.pipeline([store(&result, &value).into(), inspect.into()])?.call(&mut ctx)
    })
    .expect("pipeline runs");
    assert_eq!(ctx.result, Value::Int(72));
}

#[test]
fn trailing_variable_yields_its_value() {
    let result = variables(|scope| {
        let total = scope.variable("total")?;
        scope
            .pipeline([store(&total, Value::Int(99)).into(), Term::from(&total)])?
            .call(&mut Ctx::default())
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::Int(99));
}

#[test]
fn pipeline_resolves_structured_results() {
    let mut fields: IndexMap<String, Value> = IndexMap::new();
    fields.insert("x".into(), Value::Int(5));
    fields.insert("y".into(), Value::Int(7));
    let result = variables(|scope| {
        let [x, y] = scope.attributes(["x", "y"])?;
        let swap = Step::new("swap", move |_: &mut IndexMap<String, Value>| Ok(Value::tuple([&y, &x])));
        scope.pipeline([swap.into()])?.call(&mut fields)
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::tuple([7, 5]));
}

#[test]
fn eval_vars_rebuilds_records() {
    let snt = fpipe_engine::Variable::with_value("snt", 77);
    let record = Value::Record(Record::new("typ", [("x", Value::Int(3)), ("y", Value::from(&snt))]));
    assert_eq!(
        eval_vars(&(), &record).expect("bound"),
        Value::Record(Record::new("typ", [("x", 3), ("y", 77)]))
    );
}

fn pair() -> StepFn<fpipe_engine::PipelineContext> {
    stepfn("pair", |_: &mut fpipe_engine::PipelineContext, args: Args| {
        Ok(Value::tuple([args.require(0)?.clone(), args.require(1)?.clone()]))
    })
}

#[test]
fn pipeline_context_resolves_attributes() {
    let result = context([("x", 5), ("y", 17)], |ctx| {
        let [x, y] = ctx.attributes(["x", "y"])?;
        ctx.pipeline([pair().step([&x, &y]).into()])
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::tuple([5, 17]));
}

#[test]
fn pipeline_context_keeps_its_fields() {
    let fields = context([("x", 5), ("y", 17)], |ctx| {
        let [x, y] = ctx.attributes(["x", "y"])?;
        ctx.pipeline([pair().step([&x, &y]).into()])?;
        Ok((ctx.get("x").cloned(), ctx.get("y").cloned()))
    })
    .expect("pipeline runs");
    assert_eq!(fields, (Some(Value::Int(5)), Some(Value::Int(17))));
}

#[test]
fn pipeline_context_variables() {
    let result = context(Vec::<(String, Value)>::new(), |ctx| {
        let [x, y] = ctx.variables(["x", "y"])?;
        ctx.pipeline([
            store(&x, Value::Int(5)).into(),
            store(&y, Value::Int(17)).into(),
            pair().step([&x, &y]).into(),
        ])
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::tuple([5, 17]));
}

#[test]
fn user_errors_propagate_unchanged() {
    let boom = stepfn("boom", |_: &mut Ctx, _| Err(anyhow::anyhow!("boom").into()));
    let mut ctx = Ctx::default();
    let error = pipeline([tstep().step([1]), boom.step(()), tstep().step([2])])
        .call(&mut ctx)
        .expect_err("boom aborts");
    assert_eq!(error.to_string(), "boom");
    assert_eq!(ctx.trace.len(), 1);
}

#[test]
fn free_pipeline_results_outlive_their_scope() {
    let mut fields = IndexMap::from([("x".to_string(), Value::Int(5)), ("y".to_string(), Value::Int(7))]);
    let result = variables(|scope| {
        let [x, y] = scope.attributes(["x", "y"])?;
        let swap = Step::new("swap", move |_: &mut IndexMap<String, Value>| Ok(Value::tuple([&y, &x])));
        pipeline([swap]).call(&mut fields)
    })
    .expect("pipeline runs");
    assert_eq!(result, Value::tuple([7, 5]));
    assert_eq!(result.to_json().expect("no placeholders left"), serde_json::json!([7, 5]));
}
