use serde::Serialize;
use std::fmt;

use crate::error::{Result, ResultsError};

/// A point on a course: the start, a numbered control's code, or the finish
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ControlCode {
    Start,
    Control(String),
    Finish,
}

impl ControlCode {
    pub fn control(code: impl Into<String>) -> ControlCode {
        ControlCode::Control(code.into())
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCode::Start => write!(f, "Start"),
            ControlCode::Control(code) => write!(f, "{}", code),
            ControlCode::Finish => write!(f, "Finish"),
        }
    }
}

/// A physical course. Classes are held as indexes into `Results::classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub name: String,
    pub classes: Vec<usize>,
    /// Length in kilometres
    pub length: Option<f64>,
    /// Climb in metres
    pub climb: Option<u32>,
    pub controls: Option<Vec<String>>,
    /// Length of each leg (start to control 1, ..., last control to finish)
    pub leg_lengths: Option<Vec<f64>>,
}

impl Course {
    pub fn new(
        name: impl Into<String>,
        classes: Vec<usize>,
        length: Option<f64>,
        climb: Option<u32>,
        controls: Option<Vec<String>>,
    ) -> Course {
        Course {
            name: name.into(),
            classes,
            length,
            climb,
            controls,
            leg_lengths: None,
        }
    }

    /// Attaches per-leg lengths; there must be one more leg than controls
    pub fn set_leg_lengths(&mut self, leg_lengths: Vec<f64>) -> Result<()> {
        if let Some(controls) = &self.controls {
            if leg_lengths.len() != controls.len() + 1 {
                return Err(ResultsError::invalid(format!(
                    "Course '{}' has {} controls so needs {} leg lengths, got {}",
                    self.name,
                    controls.len(),
                    controls.len() + 1,
                    leg_lengths.len()
                )));
            }
        }
        self.leg_lengths = Some(leg_lengths);
        Ok(())
    }

    pub fn has_controls(&self) -> bool {
        self.controls.is_some()
    }

    /// Classes on this course other than the given one
    pub fn other_classes(&self, class_index: usize) -> Vec<usize> {
        self.classes.iter().copied().filter(|&c| c != class_index).collect()
    }

    /// Code of the control at the given index (0 = start, controls + 1 = finish)
    pub fn control_code(&self, control: usize) -> Result<ControlCode> {
        let controls = self
            .controls
            .as_ref()
            .ok_or_else(|| ResultsError::invalid(format!("Course '{}' has no control codes", self.name)))?;
        if control == 0 {
            Ok(ControlCode::Start)
        } else if control <= controls.len() {
            Ok(ControlCode::Control(controls[control - 1].clone()))
        } else if control == controls.len() + 1 {
            Ok(ControlCode::Finish)
        } else {
            Err(ResultsError::invalid(format!(
                "Cannot get control code of control {} on course '{}' with {} controls",
                control,
                self.name,
                controls.len()
            )))
        }
    }

    /// Full sequence: start, controls, finish
    fn all_codes(&self) -> Option<Vec<ControlCode>> {
        let controls = self.controls.as_ref()?;
        let mut codes = Vec::with_capacity(controls.len() + 2);
        codes.push(ControlCode::Start);
        codes.extend(controls.iter().cloned().map(ControlCode::Control));
        codes.push(ControlCode::Finish);
        Some(codes)
    }

    /// Index of the control that ends the first leg from `start` to `end`
    pub fn leg_number(&self, start: &ControlCode, end: &ControlCode) -> Option<usize> {
        let codes = self.all_codes()?;
        codes
            .windows(2)
            .position(|pair| &pair[0] == start && &pair[1] == end)
            .map(|i| i + 1)
    }

    pub fn uses_leg(&self, start: &ControlCode, end: &ControlCode) -> bool {
        self.leg_number(start, end).is_some()
    }

    pub fn has_control(&self, code: &str) -> bool {
        self.controls
            .as_ref()
            .map_or(false, |controls| controls.iter().any(|c| c == code))
    }

    /// Every code that follows an occurrence of `code` on this course
    pub fn next_controls(&self, code: &ControlCode) -> Result<Vec<ControlCode>> {
        let codes = self
            .all_codes()
            .ok_or_else(|| ResultsError::invalid(format!("Course '{}' has no control codes", self.name)))?;
        let next: Vec<ControlCode> = codes
            .windows(2)
            .filter(|pair| &pair[0] == code)
            .map(|pair| pair[1].clone())
            .collect();
        if next.is_empty() {
            return Err(ResultsError::invalid(format!(
                "Control '{}' not found on course '{}'",
                code, self.name
            )));
        }
        Ok(next)
    }
}
