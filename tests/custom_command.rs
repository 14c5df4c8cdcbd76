use assert_matches::assert_matches;

use qwsengine::{
    Command, ExecutionContext, ExecutionError, MemorySurface, Record, Registry, RegistryError,
    ScriptExecutor, ValidationError, WaitPolicy,
};

/// Logs the current page's text length.
#[derive(Debug)]
struct MeasureText {
    label: String,
}

impl Command for MeasureText {
    fn kind(&self) -> &str {
        "measure_text"
    }

    fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), ExecutionError> {
        let surface = ctx.surface.as_deref().ok_or(ExecutionError::NoSurface)?;
        let page = surface.current_page().ok_or(ExecutionError::NoPage)?;
        let text = page
            .rendered_text()
            .map_err(|source| ExecutionError::Extraction { what: "text", source })?;
        ctx.log(format!("{}: {} chars", self.label, text.chars().count()));
        Ok(())
    }

    fn to_record(&self) -> Record {
        Record::new("measure_text").with("label", self.label.clone())
    }
}

fn measure(record: &Record) -> Result<Box<dyn Command>, ValidationError> {
    let label = record
        .str_param("label")?
        .ok_or_else(|| ValidationError::missing("label"))?;
    Ok(Box::new(MeasureText {
        label: label.to_string(),
    }))
}

#[test]
fn installed_registry_serves_custom_kinds() {
    let mut registry = Registry::with_builtins();
    registry.register("measure_text", measure).unwrap();
    assert_matches!(
        registry.register("measure_text", measure),
        Err(RegistryError::Duplicate(name)) if name == "measure_text"
    );
    Registry::install(registry).unwrap();

    let global = Registry::global();
    assert_eq!(
        global.list(),
        ["measure_text", "navigate", "pause", "save_markup", "save_text"]
    );
    assert!(Registry::install(Registry::new()).is_err());

    let surface = MemorySurface::new().with_page("https://a.example", "<b>hello</b>", "hello");
    let ctx = ExecutionContext::new()
        .with_surface(surface)
        .with_wait_policy(WaitPolicy::immediate());
    let mut executor = ScriptExecutor::with_global_registry(ctx);
    executor.load_records(&[
        Record::new("navigate").with("url", "https://a.example"),
        Record::new("measure_text").with("label", "greeting"),
        Record::new("measure_text"),
    ]);

    assert_eq!(executor.len(), 2);
    assert_eq!(
        executor.load_errors(),
        ["Error loading command 2: invalid 'measure_text' command: 'label' parameter is required"]
    );
    assert!(executor.execute());
    assert!(
        executor
            .context()
            .logs()
            .iter()
            .any(|l| l.ends_with("greeting: 5 chars"))
    );
}
