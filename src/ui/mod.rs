pub mod terminal;

pub use terminal::TerminalView;
