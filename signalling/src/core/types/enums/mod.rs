pub mod ws_event;
