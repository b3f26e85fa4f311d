//! Job staging and state updates
//!
//! A dispatched job gets a row as soon as its working directory is allocated (staged). Once the
//! queue accepted the job script the row moves to submitted and stores the queue's job id.

pub mod load;
pub mod stage;
pub mod state;
pub mod update;
