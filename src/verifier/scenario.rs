//! Canned Responses-API conversation used to exercise affinity.
//!
//! The first call creates a response; every further call continues the one
//! before it through `previous_response_id`. A gateway that routes a
//! continuation to a backend that never saw the first call answers "not found".

use crate::verifier::Step;
use serde_json::json;

pub const FIRST_INPUT: &str = "This is a test";
pub const FOLLOW_UP_INPUT: &str = "Explain this at a level that could be understood by a college freshman";
pub const OUTPUT_TEXT_POINTER: &str = "/output/0/content/0/text";

const RESPONSES_PATH: &str = "responses";
const PREVIOUS_RESPONSE_FIELD: &str = "previous_response_id";

/// A create-response step followed by `follow_ups` chained continuations.
pub fn responses_chain(deployment: &str, follow_ups: usize) -> Vec<Step> {
    let mut steps = vec![Step::post("create initial response", RESPONSES_PATH)
        .json(json!({ "model": deployment, "input": FIRST_INPUT }))
        .preview_pointer(OUTPUT_TEXT_POINTER)];

    for i in 0..follow_ups {
        steps.push(
            Step::post(format!("continue response #{}", i + 1), RESPONSES_PATH)
                .json(json!({
                    "model": deployment,
                    "input": [{ "role": "user", "content": FOLLOW_UP_INPUT }],
                }))
                .preview_pointer(OUTPUT_TEXT_POINTER)
                .continue_from(i, PREVIOUS_RESPONSE_FIELD),
        );
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_follow_up_continues_the_previous_step() {
        let steps = responses_chain("gpt-4.1-mini", 3);

        assert_eq!(steps.len(), 4);
        assert!(steps[0].depends_on.is_none());
        for (i, step) in steps.iter().enumerate().skip(1) {
            let dep = step.depends_on.as_ref().unwrap();
            assert_eq!(dep.step, i - 1);
            assert_eq!(dep.field, PREVIOUS_RESPONSE_FIELD);
        }
    }

    #[test]
    fn bodies_name_the_deployment() {
        for step in responses_chain("my-deployment", 1) {
            assert_eq!(step.body.unwrap()["model"], "my-deployment");
        }
    }
}
