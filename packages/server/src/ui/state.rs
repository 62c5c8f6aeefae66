//! Shared application state.

use std::sync::Arc;

use crate::usecase::{
    AssignRoomUseCase, ConnectDeviceUseCase, DisconnectDeviceUseCase, GetRoomsUseCase,
    RouteMessageUseCase,
};

/// Shared application state
pub struct AppState {
    /// AssignRoomUseCase（ルーム割り当てのユースケース）
    pub assign_room_usecase: Arc<AssignRoomUseCase>,
    /// ConnectDeviceUseCase（デバイス接続のユースケース）
    pub connect_device_usecase: Arc<ConnectDeviceUseCase>,
    /// DisconnectDeviceUseCase（デバイス切断のユースケース）
    pub disconnect_device_usecase: Arc<DisconnectDeviceUseCase>,
    /// RouteMessageUseCase（メッセージ中継のユースケース）
    pub route_message_usecase: Arc<RouteMessageUseCase>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
}
