use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    Up,
    Down,
    Left,
    Right,
    Action,
    Cancel,
    Quit,
}

const KEY_COUNT: usize = 7;

impl InputKey {
    const fn index(self) -> usize {
        match self {
            InputKey::Up => 0,
            InputKey::Down => 1,
            InputKey::Left => 2,
            InputKey::Right => 3,
            InputKey::Action => 4,
            InputKey::Cancel => 5,
            InputKey::Quit => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; KEY_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, key: InputKey, is_down: bool) {
        self.down[key.index()] = is_down;
    }

    pub(crate) fn is_down(&self, key: InputKey) -> bool {
        self.down[key.index()]
    }
}

/// Discrete input delivered to the active scene and its running commands.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyPressed { key: InputKey },
    KeyReleased { key: InputKey },
    KeyPressedRepeat { key: InputKey },
    /// Sent for the first press and for every repeat of a held key.
    KeyPressedAndRepeat { key: InputKey },
    MouseDown { x: f32, y: f32 },
    MouseMove { x: f32, y: f32 },
    MouseUp { x: f32, y: f32 },
}

/// Held-key state sampled once per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    keys: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, key: InputKey) -> bool {
        self.keys.is_down(key)
    }

    pub fn with_key_down(mut self, key: InputKey, is_down: bool) -> Self {
        self.keys.set(key, is_down);
        self
    }
}

/// Ticks between synthesized repeats of a held key.
pub const KEY_REPEAT_TICKS: u32 = 8;

/// Turns raw key presses into the per-tick event stream: a press also yields
/// `KeyPressedAndRepeat`, a held key repeats every [`KEY_REPEAT_TICKS`].
#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    quit_requested: bool,
    keys: ActionStates,
    held_ticks: [u32; KEY_COUNT],
    pending: Vec<InputEvent>,
}

impl InputCollector {
    pub(crate) fn press(&mut self, key: InputKey) {
        if key == InputKey::Quit {
            self.quit_requested = true;
        }
        if self.keys.is_down(key) {
            return;
        }
        self.keys.set(key, true);
        self.held_ticks[key.index()] = 0;
        self.pending.push(InputEvent::KeyPressed { key });
        self.pending.push(InputEvent::KeyPressedAndRepeat { key });
    }

    pub(crate) fn release(&mut self, key: InputKey) {
        if !self.keys.is_down(key) {
            return;
        }
        self.keys.set(key, false);
        self.pending.push(InputEvent::KeyReleased { key });
    }

    pub(crate) fn push(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyPressed { key } => self.press(key),
            InputEvent::KeyReleased { key } => self.release(key),
            other => self.pending.push(other),
        }
    }

    /// Events to deliver before the next tick, then the held state for it.
    pub(crate) fn drain_for_tick(&mut self) -> (Vec<InputEvent>, InputSnapshot) {
        for key in ALL_KEYS {
            if !self.keys.is_down(key) {
                continue;
            }
            let held = &mut self.held_ticks[key.index()];
            *held = held.saturating_add(1);
            if *held % KEY_REPEAT_TICKS == 0 {
                self.pending.push(InputEvent::KeyPressedRepeat { key });
                self.pending.push(InputEvent::KeyPressedAndRepeat { key });
            }
        }
        let events = std::mem::take(&mut self.pending);
        let snapshot = InputSnapshot {
            quit_requested: self.quit_requested,
            keys: self.keys,
        };
        (events, snapshot)
    }
}

const ALL_KEYS: [InputKey; KEY_COUNT] = [
    InputKey::Up,
    InputKey::Down,
    InputKey::Left,
    InputKey::Right,
    InputKey::Action,
    InputKey::Cancel,
    InputKey::Quit,
];

/// One line of a headless input script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedInput {
    pub tick: u64,
    #[serde(flatten)]
    pub event: InputEvent,
}
