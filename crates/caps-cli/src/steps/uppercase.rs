//! Builtin step: uppercase a text input into a result directory.
//!
//! Reads input `text` and writes `result_dir/out.txt`, demonstrating a
//! directory output that becomes a tree snapshot.

use std::fs;

use serde_json::Value;

use caps_engine::{EngineError, Result, RunContext, Step, StepData, StepModule};

pub struct Uppercase;

impl Step for Uppercase {
    fn load(&self, ctx: &RunContext) -> Result<StepData> {
        let text = ctx.read_input_string("text")?;
        let mut data = StepData::new();
        data.insert("text".to_string(), Value::String(text));
        Ok(data)
    }

    fn transform(&self, _ctx: &RunContext, loaded: StepData) -> Result<StepData> {
        let text = loaded
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::step("load phase produced no text"))?;
        let mut results = StepData::new();
        results.insert("out".to_string(), Value::String(text.to_uppercase()));
        Ok(results)
    }

    fn save(&self, ctx: &RunContext, results: StepData) -> Result<()> {
        let out = results
            .get("out")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::step("transform phase produced no output"))?;
        fs::write(ctx.output_path("result_dir/out.txt")?, out)?;
        Ok(())
    }
}

pub fn module() -> StepModule {
    StepModule::new(
        "uppercase",
        "caps-cli/src/steps/uppercase.rs",
        include_str!("uppercase.rs"),
        Box::new(Uppercase),
    )
}
