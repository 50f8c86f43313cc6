//! Guide statement templating.
//!
//! Statement lines may contain `{placeholder}` tokens that are filled from
//! the live simulation. Unknown placeholders are left untouched so that a
//! typo shows up on screen instead of silently vanishing.

use crate::substances::Substance;

/// Values available to statement templates.
#[derive(Debug, Clone, Copy)]
pub struct StatementContext<'a> {
    pub substance: Option<&'a Substance>,
    pub ph: f64,
    pub substance_moles: f64,
}

impl StatementContext<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "pH" => Some(format!("{:.2}", self.ph)),
            "pOH" => Some(format!("{:.2}", 14.0 - self.ph)),
            "moles" => Some(format!("{:.3}", self.substance_moles)),
            "substance" => self.substance.map(|s| s.symbol.clone()),
            "substanceName" => self.substance.map(|s| s.name.clone()),
            "primaryIon" => self.substance.map(|s| s.primary_ion.clone()),
            "secondaryIon" => self.substance.map(|s| s.secondary_ion.clone()),
            _ => None,
        }
    }
}

/// Fill every `{placeholder}` in `template`.
pub fn resolve(template: &str, ctx: &StatementContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let key = &after[..close];
                match ctx.lookup(key) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Resolve each line of a multi-line statement.
pub fn resolve_lines(lines: &[String], ctx: &StatementContext<'_>) -> Vec<String> {
    lines.iter().map(|line| resolve(line, ctx)).collect()
}
