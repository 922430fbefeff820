//! Builtin step: append a suffix parameter to a text input.
//!
//! Reads input `text`, appends the `suffix` parameter (default `!`),
//! and writes `out.txt`.

use std::fs;

use serde_json::Value;

use caps_core::param::{ParamMap, ParamValue};
use caps_engine::{EngineError, Result, RunContext, Step, StepData, StepModule};

pub struct AppendSuffix;

impl Step for AppendSuffix {
    fn defaults(&self) -> ParamMap {
        let mut d = ParamMap::new();
        d.insert("suffix".to_string(), ParamValue::Str("!".to_string()));
        d
    }

    fn load(&self, ctx: &RunContext) -> Result<StepData> {
        let text = ctx.read_input_string("text")?;
        let mut data = StepData::new();
        data.insert("text".to_string(), Value::String(text));
        Ok(data)
    }

    fn transform(&self, ctx: &RunContext, loaded: StepData) -> Result<StepData> {
        let text = loaded
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::step("load phase produced no text"))?;
        let suffix = ctx
            .param("suffix")
            .map(ToString::to_string)
            .unwrap_or_default();
        let mut results = StepData::new();
        results.insert("out".to_string(), Value::String(format!("{text}{suffix}")));
        Ok(results)
    }

    fn save(&self, ctx: &RunContext, results: StepData) -> Result<()> {
        let out = results
            .get("out")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::step("transform phase produced no output"))?;
        fs::write(ctx.output_path("out.txt")?, out)?;
        Ok(())
    }
}

pub fn module() -> StepModule {
    StepModule::new(
        "append-suffix",
        "caps-cli/src/steps/append_suffix.rs",
        include_str!("append_suffix.rs"),
        Box::new(AppendSuffix),
    )
}
