use std::rc::Rc;

use tracing::trace;

use crate::app::{ObjectId, SceneWorld};

use super::context::{EventRequest, EventTarget, Trigger};
use super::scheduler::SceneScheduler;
use super::value::Value;

/// System event raised when the hero presses action on or in front of an
/// object.
pub const EVENT_ACTION: u32 = 0;
/// System event raised by an object's own clock. Parameters are
/// `[interval_ticks, repeat]`.
pub const EVENT_TIME: u32 = 1;

/// Delivers one event to `target`, starting every reaction its active states
/// bind to the event. Returns whether anything was started.
pub fn receive_event(
    scheduler: &mut SceneScheduler,
    world: &mut SceneWorld,
    sender: Option<ObjectId>,
    target: ObjectId,
    is_system: bool,
    event_id: u32,
    parameters: &[Value],
) -> bool {
    let Some(object) = world.object(target) else {
        return false;
    };
    if object.is_removed() {
        return false;
    }
    let model = Rc::clone(object.model());
    if model.only_one_event_per_frame && object.received_one_event() {
        trace!(object = %target, event_id, "event_dropped_frame_limit");
        return false;
    }
    if !model.can_be_triggered_by_another_object && scheduler.bound_elsewhere(target, sender) {
        trace!(object = %target, event_id, "event_dropped_busy");
        return false;
    }

    let states = object.states().to_vec();
    let sender_position = sender
        .filter(|id| *id != target)
        .and_then(|id| world.object(id))
        .map(|sender| sender.position);

    let mut started = false;
    for state in states {
        for reaction in model.reactions_for(is_system, event_id, state, parameters) {
            let trigger = Trigger {
                sender,
                object: Some(target),
                state_id: Some(state),
                event_id: Some(event_id),
                parameters: parameters.to_vec(),
            };
            if scheduler
                .add_reaction(world, reaction, trigger, false)
                .is_none()
            {
                continue;
            }
            if let Some(object) = world.object_mut(target) {
                if let Some(position) = sender_position {
                    if !object.direction_fix() {
                        object.face_towards(position);
                    }
                }
                object.mark_received_event();
            }
            started = true;
            if model.only_one_event_per_frame {
                return true;
            }
        }
    }
    started
}

/// Fans a queued event out to its receivers. Returns how many of them
/// started at least one reaction.
pub fn send_event(
    scheduler: &mut SceneScheduler,
    world: &mut SceneWorld,
    request: &EventRequest,
) -> usize {
    let targets: Vec<ObjectId> = match request.target {
        EventTarget::All { exclude } => world
            .object_ids()
            .filter(|id| Some(*id) != exclude)
            .collect(),
        EventTarget::Object(id) => vec![id],
    };

    targets
        .into_iter()
        .filter(|target| {
            receive_event(
                scheduler,
                world,
                request.sender,
                *target,
                request.is_system,
                request.event_id,
                &request.parameters,
            )
        })
        .count()
}
