pub mod hotspot;
pub mod interface;
pub mod inventory;
pub mod locks;
pub mod nmcli;
pub mod probe;
pub mod radio;
pub mod retry;
pub mod timesync;
pub mod timesyncd;
pub mod verification;
pub mod wifi;
