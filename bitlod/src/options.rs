use crate::error::{Error, Result};
use crate::node::builder::{DEFAULT_REWRITE_LEVEL, MAX_REWRITE_LEVEL};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub rewrite_level: u8,
    pub model_gen: bool,
    pub incremental: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            rewrite_level: DEFAULT_REWRITE_LEVEL,
            model_gen: false,
            incremental: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionInfo {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    pub default: u32,
    pub description: &'static str,
}

static OPTIONS: [OptionInfo; 3] = [
    OptionInfo {
        name: "rewrite_level",
        min: 0,
        max: MAX_REWRITE_LEVEL as u32,
        default: DEFAULT_REWRITE_LEVEL as u32,
        description: "term rewriting on construction, from none (0) to full (3)",
    },
    OptionInfo {
        name: "model_gen",
        min: 0,
        max: 1,
        default: 0,
        description: "keep a model after a sat verdict",
    },
    OptionInfo {
        name: "incremental",
        min: 0,
        max: 1,
        default: 0,
        description: "allow assumptions and repeated checks",
    },
];

pub fn opt_names() -> impl Iterator<Item = &'static str> {
    OPTIONS.iter().map(|o| o.name)
}

pub fn opt_info(name: &str) -> Result<&'static OptionInfo> {
    OPTIONS
        .iter()
        .find(|o| o.name == name)
        .ok_or_else(|| Error::UnknownOption(name.to_owned()))
}

impl Options {
    /// Range-checked update by name.
    pub fn set(&mut self, name: &str, value: u32) -> Result<()> {
        let info = opt_info(name)?;
        if value < info.min || value > info.max {
            return Err(Error::OptionRange(name.to_owned(), value, info.min, info.max));
        }
        match info.name {
            "rewrite_level" => self.rewrite_level = value as u8,
            "model_gen" => self.model_gen = value == 1,
            _ => self.incremental = value == 1,
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<u32> {
        match opt_info(name)?.name {
            "rewrite_level" => Ok(self.rewrite_level as u32),
            "model_gen" => Ok(self.model_gen as u32),
            _ => Ok(self.incremental as u32),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{opt_info, opt_names, Options};
    use crate::error::Error;

    #[test]
    fn by_name() {
        let mut opts = Options::default();
        assert_eq!(opts.get("rewrite_level").unwrap(), 3);
        opts.set("model_gen", 1).unwrap();
        assert!(opts.model_gen);
        assert!(matches!(
            opts.set("rewrite_level", 4),
            Err(Error::OptionRange(_, 4, 0, 3))
        ));
        assert!(matches!(opts.get("verbosity"), Err(Error::UnknownOption(_))));
        assert_eq!(opt_info("incremental").unwrap().default, 0);
        assert_eq!(opt_names().count(), 3);
    }

    #[test]
    fn json_defaults() {
        let opts: Options = serde_json::from_str(r#"{ "incremental": true }"#).unwrap();
        assert_eq!(
            opts,
            Options {
                incremental: true,
                ..Options::default()
            }
        );
        let text = serde_json::to_string(&opts).unwrap();
        let back: Options = serde_json::from_str(&text).unwrap();
        assert_eq!(back, opts);
    }
}
