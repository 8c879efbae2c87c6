pub mod clock;
pub mod domain;
pub mod gate;
pub mod identity;
pub mod memory;
pub mod ports;
pub mod roster;
pub mod service;
pub mod threads;
pub mod understanding;
pub mod visibility;

pub use clock::{ClockReading, SessionClock};
pub use domain::{
    AuthIdentity, AuthSession, ClassDay, Color, Credential, DateKey, Question, Role,
    SessionWindow, UnderstandingEvent, UnderstandingSummary, ADMIN_NAME, ADMIN_SCOPE,
};
pub use gate::SubmissionPolicy;
pub use memory::InMemoryStore;
pub use ports::{DatabaseService, PinHasher, PortError, PortResult, SystemTime, TimeSource};
pub use roster::{Course, CourseSchedule, Meeting, Roster};
pub use service::{Classroom, ClassroomSettings};
