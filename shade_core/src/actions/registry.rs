use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use super::parser::{self, CommandSignature, InputAction};
use crate::error::ActionTableError;

type Index = HashMap<CommandSignature, InputAction>;

/// Reverse index from bus command to the input action that produces it.
///
/// The index is rebuilt off to the side on every `register` and swapped in
/// whole, so lookups see either the old table or the new one, never a mix.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    index: RwLock<Arc<Index>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole index with `actions`.
    ///
    /// On a signature collision the entry already indexed wins over an
    /// alternate; a canonical entry replaces whatever was there. Returns the
    /// number of signatures in the index that was swapped in.
    pub fn register<I>(&self, actions: I) -> usize
    where
        I: IntoIterator<Item = InputAction>,
    {
        let mut next = Index::new();
        for action in actions {
            match next.entry(action.command_signature()) {
                Entry::Vacant(slot) => {
                    slot.insert(action);
                }
                Entry::Occupied(mut slot) => {
                    if action.is_alternate {
                        tracing::debug!(signature = %slot.key(), input = action.input_number, "keeping canonical action over alternate");
                    } else {
                        slot.insert(action);
                    }
                }
            }
        }
        let len = next.len();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        tracing::debug!(actions = len, "action registry replaced");
        len
    }

    /// Parse `raw` and register the result. A header error leaves the
    /// current index untouched.
    pub fn register_raw(&self, raw: &[u8]) -> Result<usize, ActionTableError> {
        let actions = parser::parse(raw)?;
        Ok(self.register(actions))
    }

    pub fn lookup(
        &self,
        endpoint: u8,
        cluster_id: u16,
        command_id: u8,
        payload: &[u8],
    ) -> Option<InputAction> {
        self.lookup_signature(&CommandSignature::new(
            endpoint, cluster_id, command_id, payload,
        ))
    }

    pub fn lookup_signature(&self, signature: &CommandSignature) -> Option<InputAction> {
        self.snapshot().get(signature).cloned()
    }

    /// The current index. Later `register` calls do not affect it.
    pub fn snapshot(&self) -> Arc<HashMap<CommandSignature, InputAction>> {
        Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::parser::{InputState, PressType};

    fn action(input: u8, command: u8, is_alternate: bool) -> InputAction {
        InputAction {
            input_number: input,
            input_options: 0,
            initial_state: InputState::Pressed,
            final_state: InputState::Released,
            has_alternate: is_alternate,
            is_alternate,
            source_endpoint: 2,
            cluster_id: 0x0102,
            command_id: command,
            command_payload: vec![],
            press_type: PressType::ShortPress,
        }
    }

    #[test]
    fn alternate_does_not_displace_canonical() {
        let reg = ActionRegistry::new();
        assert_eq!(reg.register([action(0, 1, false), action(1, 1, true)]), 1);
        assert_eq!(reg.lookup(2, 0x0102, 1, &[]).unwrap().input_number, 0);
    }

    #[test]
    fn canonical_displaces_alternate() {
        let reg = ActionRegistry::new();
        reg.register([action(1, 1, true), action(0, 1, false)]);
        assert_eq!(reg.lookup(2, 0x0102, 1, &[]).unwrap().input_number, 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let reg = ActionRegistry::new();
        reg.register([action(0, 1, false)]);
        let before = reg.snapshot();
        reg.register([action(0, 2, false), action(1, 3, false)]);
        assert_eq!(before.len(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn bad_header_keeps_previous_index() {
        let reg = ActionRegistry::new();
        reg.register([action(0, 1, false)]);
        assert!(reg.register_raw(&[0x00, 0x41, 0x00, 0x00]).is_err());
        assert_eq!(reg.len(), 1);
    }
}
