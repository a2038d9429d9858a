use std::fmt;
use std::str::FromStr;

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

/// Analysis mode requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Basic,
    Detailed,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Basic => "basic",
            Mode::Detailed => "detailed",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Mode::Basic),
            "detailed" => Ok(Mode::Detailed),
            _ => Err(()),
        }
    }
}

/// Calories as the provider sent them: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Calories {
    Number(serde_json::Number),
    Text(String),
}

impl Calories {
    pub fn number(n: u64) -> Self {
        Calories::Number(n.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Calories::Text(s.into())
    }
}

/// The estimate returned by `/api/estimate`.
///
/// `ingredients` is only emitted in detailed mode, where it is either `null`
/// or a list of strings. A `None` calorie count means no food was found, in
/// which case every other value is `None` too and `message` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroEstimate {
    pub mode: Mode,
    pub calories: Option<Calories>,
    pub protein: Option<String>,
    pub carbs: Option<String>,
    pub fat: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl MacroEstimate {
    pub fn empty(mode: Mode) -> Self {
        Self {
            mode,
            calories: None,
            protein: None,
            carbs: None,
            fat: None,
            ingredients: None,
            message: None,
            error: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

pub const NO_FOOD_MESSAGE: &str = "No food detected in the image";

impl Serialize for MacroEstimate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("calories", &self.calories)?;
        map.serialize_entry("protein", &self.protein)?;
        map.serialize_entry("carbs", &self.carbs)?;
        map.serialize_entry("fat", &self.fat)?;
        if self.mode == Mode::Detailed {
            map.serialize_entry("ingredients", &self.ingredients)?;
        }
        if let Some(message) = &self.message {
            map.serialize_entry("message", message)?;
        }
        if let Some(error) = &self.error {
            map.serialize_entry("error", error)?;
        }
        map.end()
    }
}
