pub mod mock_server;
pub mod ws_server;
