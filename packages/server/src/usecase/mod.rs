//! UseCase layer: the relay's application logic, one use case per operation.

mod assign_room;
mod connect_device;
mod disconnect_device;
mod get_rooms;
mod route_message;

pub use assign_room::{AssignRoomUseCase, Assignment, Placement};
pub use connect_device::ConnectDeviceUseCase;
pub use disconnect_device::{DisconnectDeviceUseCase, Teardown};
pub use get_rooms::{GetRoomsUseCase, RelayStatus};
pub use route_message::{ActiveConnection, RelayReport, RouteMessageUseCase};
