/// Aggregated view of session progress, useful for UI shells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total_questions: usize,
    pub answered: usize,
    pub current_index: usize,
    pub time_remaining_secs: u32,
    pub is_complete: bool,
}
