//! Session-owned tunable parameter table.
//!
//! Replaces a global configuration singleton: the table is owned by the
//! controller, looked up by lower-cased name from `setoption`, and read
//! through typed getters when a search captures its settings.

/// One tunable integer parameter with its protocol metadata.
#[derive(Debug, Clone)]
pub struct SpinParam {
    /// Canonical name as printed in the option list.
    pub name: &'static str,
    pub default: i64,
    pub min: i64,
    pub max: i64,
    pub value: i64,
}

/// Ordered name-to-parameter table.
#[derive(Debug, Clone)]
pub struct Params {
    params: Vec<SpinParam>,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        let mut params = Params { params: Vec::new() };
        params.register("BishopPairBonus", 30, 0, 100);
        params.register("TempoBonus", 10, 0, 50);
        params.register("AspirationWindow", 25, 0, 200);
        params
    }

    fn register(&mut self, name: &'static str, default: i64, min: i64, max: i64) {
        self.params.push(SpinParam {
            name,
            default,
            min,
            max,
            value: default,
        });
    }

    /// Set a parameter from protocol text. Unknown names, malformed
    /// numbers and out-of-range values are silently ignored.
    pub fn set(&mut self, lower_name: &str, value: &str) {
        let Some(param) = self
            .params
            .iter_mut()
            .find(|p| p.name.to_ascii_lowercase() == lower_name)
        else {
            log::debug!("ignoring unknown option '{lower_name}'");
            return;
        };
        match value.trim().parse::<i64>() {
            Ok(v) if (param.min..=param.max).contains(&v) => param.value = v,
            _ => log::debug!("ignoring bad value '{value}' for option '{lower_name}'"),
        }
    }

    /// Current value of a parameter by lower-cased name.
    #[must_use]
    pub fn get(&self, lower_name: &str) -> Option<i64> {
        self.params
            .iter()
            .find(|p| p.name.to_ascii_lowercase() == lower_name)
            .map(|p| p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpinParam> {
        self.params.iter()
    }
}

impl Default for Params {
    fn default() -> Self {
        Params::new()
    }
}
