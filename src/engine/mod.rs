pub mod clock;
pub mod countdown;
pub mod deadline;
pub mod formatter;
