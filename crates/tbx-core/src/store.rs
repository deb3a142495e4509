use crate::directory::{MachineRepository, UserRepository};
use crate::events::EventRepository;
use crate::sessions::SessionRepository;
use crate::TestboxError;

pub trait Store {
    type Sessions<'a>: SessionRepository
    where
        Self: 'a;
    type Users<'a>: UserRepository
    where
        Self: 'a;
    type Machines<'a>: MachineRepository
    where
        Self: 'a;
    type Events<'a>: EventRepository
    where
        Self: 'a;

    fn sessions(&self) -> Self::Sessions<'_>;
    fn users(&self) -> Self::Users<'_>;
    fn machines(&self) -> Self::Machines<'_>;
    fn events(&self) -> Self::Events<'_>;

    /// Runs `f` inside one transaction; mutations either fully apply or leave
    /// no trace. Serializes writers, so at most one mutation is in flight per
    /// store.
    fn with_tx<F, T>(&self, f: F) -> Result<T, TestboxError>
    where
        F: FnOnce(&Self) -> Result<T, TestboxError>;
}
