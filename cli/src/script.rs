//! Scripted edits, one JSON object per line.
//!
//! ```text
//! {"op":"rect","as":"r1","left":10,"top":10,"width":50,"height":50}
//! {"op":"move","ids":["r1"],"dx":20,"dy":0}
//! {"op":"wait","ms":500}
//! {"op":"undo"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Draw commands may
//! name the new object with `as`; later commands accept that alias anywhere
//! an object id is expected.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use scene::consts::{DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE};
use scene::doc::{Geometry, ObjectId, Point, Props, Style};
use scene::echo::Clock;
use scene::session::{Confirm, SyncSession};
use scene::surface::Surface;
use scene::transform::GroupTransform;
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Parse { line: usize, source: serde_json::Error },
    #[error("unknown object `{0}`")]
    UnknownObject(String),
}

/// Optional style overrides on draw commands.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StyleArgs {
    pub stroke: Option<String>,
    pub fill: Option<String>,
    #[serde(rename = "strokeWidth")]
    pub stroke_width: Option<f64>,
}

impl StyleArgs {
    fn into_style(self) -> Style {
        let defaults = Style::default();
        Style {
            stroke: self.stroke.unwrap_or(defaults.stroke),
            stroke_width: self.stroke_width.unwrap_or(defaults.stroke_width),
            fill: self.fill.unwrap_or(defaults.fill),
        }
    }
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Command {
    Rect {
        #[serde(rename = "as")]
        alias: Option<String>,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        #[serde(flatten)]
        style: StyleArgs,
    },
    Circle {
        #[serde(rename = "as")]
        alias: Option<String>,
        left: f64,
        top: f64,
        radius: f64,
        #[serde(flatten)]
        style: StyleArgs,
    },
    Line {
        #[serde(rename = "as")]
        alias: Option<String>,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(flatten)]
        style: StyleArgs,
    },
    Pen {
        #[serde(rename = "as")]
        alias: Option<String>,
        points: Vec<[f64; 2]>,
        #[serde(flatten)]
        style: StyleArgs,
    },
    Text {
        #[serde(rename = "as")]
        alias: Option<String>,
        text: String,
        left: f64,
        top: f64,
        #[serde(rename = "fontSize")]
        font_size: Option<f64>,
        #[serde(rename = "fontFamily")]
        font_family: Option<String>,
        #[serde(flatten)]
        style: StyleArgs,
    },
    /// Sparse property update on one object.
    Modify { id: String, props: Props },
    /// Replace the local selection.
    Select { ids: Vec<String> },
    /// Translate the selection, or `ids` when given.
    Move {
        #[serde(default)]
        ids: Option<Vec<String>>,
        dx: f64,
        dy: f64,
    },
    /// Move, scale and rotate the selection as a group.
    Transform {
        #[serde(default)]
        ids: Option<Vec<String>>,
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
        #[serde(rename = "scaleX", default = "one")]
        scale_x: f64,
        #[serde(rename = "scaleY", default = "one")]
        scale_y: f64,
        #[serde(default)]
        angle: f64,
    },
    Undo,
    Clear,
    /// Keep processing room traffic for `ms` before the next command.
    Wait { ms: u64 },
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// 1-based source line.
    pub line: usize,
    pub command: Command,
}

/// What the host should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Continue,
    Wait(Duration),
}

/// Parse every non-blank, non-comment line of `text`.
///
/// # Errors
///
/// Returns [`ScriptError::Parse`] for the first line that is not a command.
pub fn parse(text: &str) -> Result<Vec<Step>, ScriptError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .map(|(i, l)| {
            serde_json::from_str(l.trim())
                .map(|command| Step { line: i + 1, command })
                .map_err(|source| ScriptError::Parse { line: i + 1, source })
        })
        .collect()
}

/// Executes steps against a session, tracking draw aliases.
#[derive(Debug, Default)]
pub struct ScriptRunner {
    aliases: HashMap<String, ObjectId>,
}

impl ScriptRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Object id for an alias or a literal id.
    #[must_use]
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    /// Run one command.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::UnknownObject`] when a command names an object
    /// the scene does not contain.
    pub fn run<S: Surface, C: Clock>(
        &mut self,
        session: &mut SyncSession<S, C>,
        command: Command,
        confirm: &impl Confirm,
    ) -> Result<Effect, ScriptError> {
        match command {
            Command::Rect { alias, left, top, width, height, style } => {
                self.draw(session, alias, Geometry::Rectangle { left, top, width, height }, style);
            }
            Command::Circle { alias, left, top, radius, style } => {
                self.draw(session, alias, Geometry::Circle { left, top, radius }, style);
            }
            Command::Line { alias, x1, y1, x2, y2, style } => {
                self.draw(session, alias, Geometry::Line { x1, y1, x2, y2 }, style);
            }
            Command::Pen { alias, points, style } => {
                let points = points.into_iter().map(|[x, y]| Point::new(x, y)).collect();
                self.draw(session, alias, Geometry::FreehandPath { points }, style);
            }
            Command::Text { alias, text, left, top, font_size, font_family, style } => {
                let geometry = Geometry::Text {
                    text,
                    left,
                    top,
                    font_size: font_size.unwrap_or(DEFAULT_FONT_SIZE),
                    font_family: font_family.unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_owned()),
                };
                self.draw(session, alias, geometry, style);
            }
            Command::Modify { id, props } => {
                let id = self.resolve(&id).to_owned();
                if !session.modify(&id, &props) {
                    return Err(ScriptError::UnknownObject(id));
                }
            }
            Command::Select { ids } => {
                let ids = self.resolve_all(session, &ids)?;
                session.select(ids);
            }
            Command::Move { ids, dx, dy } => {
                self.transform(session, ids, &GroupTransform::moved(dx, dy))?;
            }
            Command::Transform { ids, dx, dy, scale_x, scale_y, angle } => {
                self.transform(session, ids, &GroupTransform { dx, dy, scale_x, scale_y, angle })?;
            }
            Command::Undo => {
                if let Err(e) = session.undo() {
                    warn!(error = %e, "undo skipped");
                }
            }
            Command::Clear => {
                if !session.clear(confirm) {
                    warn!("clear skipped; pass --assume-yes to allow it");
                }
            }
            Command::Wait { ms } => return Ok(Effect::Wait(Duration::from_millis(ms))),
        }
        Ok(Effect::Continue)
    }

    fn draw<S: Surface, C: Clock>(
        &mut self,
        session: &mut SyncSession<S, C>,
        alias: Option<String>,
        geometry: Geometry,
        style: StyleArgs,
    ) {
        let kind = geometry.kind();
        let id = session.draw(geometry, style.into_style());
        info!(%id, kind = kind.wire_tag(), alias = alias.as_deref().unwrap_or("-"), "drew");
        if let Some(alias) = alias {
            self.aliases.insert(alias, id);
        }
    }

    fn transform<S: Surface, C: Clock>(
        &self,
        session: &mut SyncSession<S, C>,
        ids: Option<Vec<String>>,
        t: &GroupTransform,
    ) -> Result<(), ScriptError> {
        if let Some(ids) = ids {
            let ids = self.resolve_all(session, &ids)?;
            session.select(ids);
        }
        let moved = session.transform_selection(t);
        info!(moved, "transformed selection");
        Ok(())
    }

    fn resolve_all<S: Surface, C: Clock>(
        &self,
        session: &SyncSession<S, C>,
        names: &[String],
    ) -> Result<BTreeSet<ObjectId>, ScriptError> {
        names
            .iter()
            .map(|name| {
                let id = self.resolve(name);
                if session.surface().find_object(id).is_some() {
                    Ok(id.to_owned())
                } else {
                    Err(ScriptError::UnknownObject(name.clone()))
                }
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
