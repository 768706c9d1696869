//! Properties of the retry loop over arbitrary generator behaviour.

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use aoc_core::CapabilityError;
use aoc_evaluators::{Validator, ValidatorConfig};
use aoc_generator::{
    AttemptOutcome, CancellationFlag, ControllerConfig, ControllerOutcome, ControllerState,
    LlmImplementationSynthesizer, RetryController,
};
use aoc_sim::{python_response, FaultConfig, FaultySandbox, ScriptedCapability, SimEnv};

use common::{problem, sandbox, sum_context, OFF_BY_TWO, RIGHT, WRONG};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Right,
    Wrong,
    OffByTwo,
    NoCode,
    Refused,
}

fn reply() -> impl Strategy<Value = Reply> {
    prop_oneof![
        Just(Reply::Right),
        Just(Reply::Wrong),
        Just(Reply::OffByTwo),
        Just(Reply::NoCode),
        Just(Reply::Refused),
    ]
}

fn script(replies: &[Reply]) -> Vec<Result<String, CapabilityError>> {
    replies
        .iter()
        .map(|r| match r {
            Reply::Right => Ok(python_response(RIGHT)),
            Reply::Wrong => Ok(python_response(WRONG)),
            Reply::OffByTwo => Ok(python_response(OFF_BY_TWO)),
            Reply::NoCode => Ok("Sorry, no code this time.".to_string()),
            Reply::Refused => Err(CapabilityError::Refused("busy".into())),
        })
        .collect()
}

fn printed(reply: Reply) -> Option<&'static str> {
    match reply {
        Reply::Wrong => Some("6"),
        Reply::OffByTwo => Some("7"),
        _ => None,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

proptest! {
    #[test]
    fn outcome_is_decided_by_first_passing_reply(
        replies in prop::collection::vec(reply(), 1..8),
        max_attempts in 1u32..6,
    ) {
        let capability = Arc::new(ScriptedCapability::new(script(&replies)));
        let run = runtime().block_on(
            common::controller(capability.clone(), max_attempts)
                .run(&problem(), &sum_context(), &CancellationFlag::new()),
        );

        // Past the script, the fake refuses; that is just another failure.
        let budget = max_attempts as usize;
        let first_right = replies.iter().take(budget).position(|r| *r == Reply::Right);

        match first_right {
            Some(i) => {
                prop_assert!(run.succeeded());
                prop_assert_eq!(run.history.len(), i + 1);
            }
            None => {
                prop_assert!(!run.succeeded());
                prop_assert_eq!(run.history.len(), budget);
            }
        }
        prop_assert_eq!(capability.calls(), run.history.len());
    }

    #[test]
    fn every_transition_is_legal_and_ends_terminal(
        replies in prop::collection::vec(reply(), 0..8),
        max_attempts in 1u32..6,
    ) {
        let capability = Arc::new(ScriptedCapability::new(script(&replies)));
        let run = runtime().block_on(
            common::controller(capability, max_attempts)
                .run(&problem(), &sum_context(), &CancellationFlag::new()),
        );

        let transitions = run.machine.transitions();
        prop_assert_eq!(transitions.first().map(|t| t.0), Some(ControllerState::Init));
        for window in transitions.windows(2) {
            prop_assert_eq!(window[0].1, window[1].0);
        }
        for (from, to) in transitions {
            prop_assert!(from.can_transition_to(*to));
        }
        prop_assert!(run.machine.state().is_terminal());
        prop_assert_eq!(
            run.machine.state() == ControllerState::Succeeded,
            run.succeeded()
        );

        let numbers: Vec<u32> = run.history.iter().map(|r| r.attempt).collect();
        let expected: Vec<u32> = (1..=run.history.len() as u32).collect();
        prop_assert_eq!(numbers, expected);
    }

    #[test]
    fn fix_prompt_reports_latest_validated_output(
        replies in prop::collection::vec(reply(), 1..8),
    ) {
        let capability = Arc::new(ScriptedCapability::new(script(&replies)));
        let run = runtime().block_on(
            common::controller(capability.clone(), replies.len() as u32)
                .run(&problem(), &sum_context(), &CancellationFlag::new()),
        );

        let prompts = capability.prompts();
        let mut latest: Option<&str> = None;
        for (i, prompt) in prompts.iter().enumerate() {
            match latest {
                None => prop_assert!(!prompt.contains("failed validation")),
                Some(output) => {
                    let expected = format!("Got: `{}`", output);
                    prop_assert!(prompt.contains(&expected));
                }
            }
            if let Some(output) = printed(replies[i]) {
                latest = Some(output);
            }
        }
        prop_assert_eq!(prompts.len(), run.history.len());
    }

    #[test]
    fn sandbox_faults_never_pass_a_candidate(seed in 1u64..u64::MAX) {
        let env = SimEnv::with_fault_config(seed, FaultConfig::aggressive());
        let faulty = Arc::new(FaultySandbox::new(sandbox(), env.fault_injector()));
        let capability = Arc::new(ScriptedCapability::new(
            (0..4).map(|_| Ok(python_response(RIGHT))).collect(),
        ));
        let controller = RetryController::new(
            Arc::new(LlmImplementationSynthesizer::new(capability)),
            Arc::new(Validator::new(faulty.clone(), ValidatorConfig::quick())),
            ControllerConfig { max_attempts: 4, ..ControllerConfig::quick() },
        );

        let run = runtime().block_on(
            controller.run(&problem(), &sum_context(), &CancellationFlag::new()),
        );

        for record in &run.history {
            if let AttemptOutcome::Validated(result) = &record.outcome {
                for outcome in result.outcomes() {
                    prop_assert_eq!(outcome.passed, outcome.actual.render() == "5");
                }
            }
        }
        if let ControllerOutcome::Succeeded { result, .. } = &run.outcome {
            prop_assert!(result.passed());
            prop_assert_eq!(run.history.last().and_then(|r| r.validation()), Some(result));
        }
        prop_assert!(run.history.len() <= 4);

        // The candidate is always right, so every failure is an injected fault.
        let failures: Vec<&str> = run
            .history
            .iter()
            .filter_map(|r| r.validation())
            .flat_map(|result| result.failures())
            .map(|outcome| outcome.actual.render())
            .collect();
        let stats = faulty.stats();
        prop_assert_eq!(failures.len() as u64, stats.timeouts_count + stats.crashes_count);
        prop_assert_eq!(
            failures.iter().filter(|f| f.starts_with("timed out")).count() as u64,
            stats.timeouts_count
        );
    }
}
