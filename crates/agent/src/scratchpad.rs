//! Renders the step history back into prompt text.

use parallax_core::step::StepRecord;

/// Render steps as the model proposed them, each followed by what it observed.
pub fn render(steps: &[StepRecord]) -> String {
    let mut scratchpad = String::new();
    for step in steps {
        scratchpad.push('\n');
        scratchpad.push_str(&step.action.log);
        scratchpad.push_str("\nObservation: ");
        scratchpad.push_str(&step.observation);
        scratchpad.push('\n');
    }
    scratchpad
}
