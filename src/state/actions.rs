//! Action types for MVU/Reducer pattern.
//!
//! All user-initiated state mutations go through `App::update(action)` so
//! transitions stay explicit and testable.

/// Actions that can modify application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    // ===== Query Input =====
    /// Send the current input as a query.
    Submit,
    /// Insert a line break into the input.
    InsertNewline,
    /// Discard the current input.
    ClearInput,

    // ===== Log =====
    /// Scroll the log towards older entries by one line.
    LogScrollUp,
    /// Scroll the log towards newer entries by one line.
    LogScrollDown,
    /// Scroll the log towards older entries by one page.
    LogPageUp,
    /// Scroll the log towards newer entries by one page.
    LogPageDown,
    /// Jump back to the newest entry and follow new ones.
    LogScrollBottom,
    /// Remove all log entries.
    LogClear,

    // ===== General =====
    /// Dismiss the status-bar error.
    ErrorClear,
    /// Exit the application.
    Quit,
}
