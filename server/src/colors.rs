use std::collections::HashMap;
use std::sync::Mutex;

pub const PALETTE: [&str; 10] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9",
];

/// Process-wide user color assignment.
///
/// Colors are handed out in palette order and wrap around once the palette
/// is exhausted. An assignment is never freed, so a user keeps its color for
/// as long as the process lives, across reconnects and room switches.
#[derive(Debug, Default)]
pub struct ColorAllocator {
    assigned: Mutex<HashMap<String, &'static str>>,
}

impl ColorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color_for(&self, user_id: &str) -> String {
        let mut assigned = self
            .assigned
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = PALETTE[assigned.len() % PALETTE.len()];
        assigned.entry(user_id.to_string()).or_insert(next).to_string()
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned
            .lock()
            .map(|assigned| assigned.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }
}
