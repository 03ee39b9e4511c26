use std::time::SystemTime;

pub fn get_epoch_time_in_ms() -> u64 {
    let start = SystemTime::now();
    let since_the_epoch = start
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("SystemTime before UNIX EPOCH");
    since_the_epoch.as_millis() as u64
}
