//! Attribute paths into a typed value, rendered json-path style: `spec.ports[0].name`,
//! with map keys as `data["tls.crt"]`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathStep {
    /// Named attribute of an object.
    Attribute(String),
    /// Position in a list or set.
    Index(usize),
    /// Key of a map.
    Key(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePath {
    steps: SmallVec<[PathStep; 8]>,
}

impl AttributePath {
    pub fn root() -> Self { Self::default() }

    pub fn is_root(&self) -> bool { self.steps.is_empty() }

    pub fn steps(&self) -> &[PathStep] { &self.steps }

    /// Used while unwinding a recursion: the step taken by the caller goes in front.
    pub fn prepend(&mut self, step: PathStep) { self.steps.insert(0, step); }

    /// Used while descending: returns a new path one step deeper.
    pub fn child(&self, step: PathStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }
}

impl std::fmt::Display for AttributePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("(root)");
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                PathStep::Attribute(name) if i == 0 => f.write_str(name)?,
                PathStep::Attribute(name) => write!(f, ".{}", name)?,
                PathStep::Index(idx) => write!(f, "[{}]", idx)?,
                PathStep::Key(key) => write!(f, "[{:?}]", key)?,
            }
        }
        Ok(())
    }
}

impl FromIterator<PathStep> for AttributePath {
    fn from_iter<T: IntoIterator<Item = PathStep>>(iter: T) -> Self {
        Self { steps: iter.into_iter().collect() }
    }
}
