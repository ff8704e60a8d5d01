use anyhow::{anyhow, Result};
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use unic_langid::LanguageIdentifier;

const EN_GB: &str = include_str!("../i18n/en-GB.ftl");

/// Fluent-backed message catalogue for user-facing summary lines.
pub struct Messages {
    bundle: FluentBundle<FluentResource>,
}

impl Messages {
    /// Built-in catalogue. Only en-GB ships today; other tags fall back to it.
    pub fn builtin(lang: &str) -> Result<Self> {
        let fallback: LanguageIdentifier = "en-GB".parse()?;
        let langid: LanguageIdentifier = lang.parse().unwrap_or(fallback);
        let res = FluentResource::try_new(EN_GB.to_owned())
            .map_err(|(_, errs)| anyhow!("invalid en-GB.ftl: {:?}", errs))?;
        let mut bundle = FluentBundle::new(vec![langid]);
        // Arguments are plain paths and numbers; no bidi isolation marks.
        bundle.set_use_isolating(false);
        bundle.add_resource(res).map_err(|errs| anyhow!("duplicate messages: {:?}", errs))?;
        Ok(Self { bundle })
    }

    /// Format `code` with named args; unknown codes come back verbatim.
    pub fn msg(&self, code: &str, args: &[(&str, &str)]) -> String {
        let Some(msg) = self.bundle.get_message(code) else {
            return code.to_string();
        };
        let Some(pattern) = msg.value() else {
            return code.to_string();
        };
        let mut fa = FluentArgs::new();
        for (k, v) in args {
            fa.set(*k, FluentValue::from(*v));
        }
        let mut errs = vec![];
        let s = self.bundle.format_pattern(pattern, Some(&fa), &mut errs).to_string();
        if errs.is_empty() {
            s
        } else {
            code.to_string()
        }
    }
}
