pub mod reconnect;
