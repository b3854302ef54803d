//! Pure state transition function

use super::state::{STEP_COMPLETE, STEP_IDLE};
use super::{Effect, Event, Session, SessionContext, TossSource};
use crate::divination::{resolve, LINE_COUNT};
use crate::shake::SHAKE_NOTICE;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: Session) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Why an event was not applied
///
/// None of these reach a caller: the runtime drops rejected events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Divination already started (step {step}); reset first")]
    AlreadyStarted { step: u8 },
    #[error("A toss is already in flight")]
    TossInFlight,
    #[error("Not accepting tosses at step {step}")]
    NotAcceptingTosses { step: u8 },
    #[error("Toss from epoch {landed} landed in epoch {current}")]
    StaleToss { landed: u64, current: u64 },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // Step 0 -> 1, fresh lines
        Event::Start => {
            if state.step != STEP_IDLE {
                return Err(TransitionError::AlreadyStarted { step: state.step });
            }
            let new_state = Session {
                step: 1,
                lines: Vec::with_capacity(LINE_COUNT),
                flipping: false,
                reading: None,
                epoch: state.epoch,
            };
            Ok(TransitionResult::new(new_state)
                .with_effect(Effect::EngageSensor)
                .with_effect(Effect::PublishSnapshot))
        }

        // At most one toss in flight, and only during steps 1-6
        Event::RequestToss { sample, source } => {
            if state.flipping {
                return Err(TransitionError::TossInFlight);
            }
            if !state.accepting_tosses() {
                return Err(TransitionError::NotAcceptingTosses { step: state.step });
            }
            let mut new_state = state.clone();
            new_state.flipping = true;
            let result = TransitionResult::new(new_state).with_effect(Effect::schedule_settle(
                context.settle_delay,
                state.epoch,
                sample,
            ));
            // Only a shake gets announced; a manual toss was the user's own click
            let result = match source {
                TossSource::Shake => result.with_effect(Effect::notify(SHAKE_NOTICE)),
                TossSource::Manual => result,
            };
            Ok(result.with_effect(Effect::PublishSnapshot))
        }

        Event::TossLanded { epoch, line } => {
            if epoch != state.epoch {
                return Err(TransitionError::StaleToss {
                    landed: epoch,
                    current: state.epoch,
                });
            }
            if !state.flipping {
                return Err(TransitionError::NotAcceptingTosses { step: state.step });
            }

            let mut new_state = state.clone();
            new_state.record_line(line);
            new_state.flipping = false;

            match new_state.full_lines() {
                Some(lines) => {
                    new_state.reading = Some(resolve(&lines, &context.table));
                    new_state.step = STEP_COMPLETE;
                    Ok(TransitionResult::new(new_state).with_effects([
                        Effect::ReleaseSensor,
                        Effect::RearmShake,
                        Effect::PublishSnapshot,
                    ]))
                }
                None => {
                    new_state.step += 1;
                    Ok(TransitionResult::new(new_state)
                        .with_effect(Effect::RearmShake)
                        .with_effect(Effect::PublishSnapshot))
                }
            }
        }

        // Valid from anywhere
        Event::Reset => {
            let new_state = Session {
                epoch: state.epoch.wrapping_add(1),
                ..Session::new()
            };
            Ok(TransitionResult::new(new_state).with_effects([
                Effect::CancelSettle,
                Effect::ReleaseSensor,
                Effect::PublishSnapshot,
            ]))
        }
    }
}
