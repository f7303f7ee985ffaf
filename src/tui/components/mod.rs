//! # TUI Components
//!
//! UI building blocks for the terminal interface.
//!
//! ## Stateless Components (Props-Based Rendering)
//!
//! Built fresh each frame from borrowed data:
//! - `TitleBar`: app name, server, connection state
//! - `MessageView`: one transcript record
//! - `StatusPanel`: the collapsible agent status inside an assistant record
//!
//! ## Stateful Components (Event-Driven)
//!
//! Own persistent state in `TuiState` and handle `TuiEvent`s:
//! - `InputBox`: query field with submission gating
//! - `MessageList`: scrollable transcript with layout caching
//!
//! Each file carries its own state types, event types, rendering, and tests.
//! Components receive external data as props rather than reaching into `App`.
//!
//! ```text
//! components/
//! ├── mod.rs           (this file)
//! ├── title_bar.rs     (Top status bar)
//! ├── message.rs       (Single record renderer)
//! ├── status_panel.rs  (Agent status + detail log)
//! ├── message_list.rs  (Scrollable record container)
//! └── input_box/       (Query input)
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod input_box;
pub use input_box::{Affordance, InputBox, InputEvent};
pub mod message;
pub mod message_list;
pub use message_list::{MessageList, MessageListState};
pub mod status_panel;
