// ── History table schema ──

pub trait Table {
    /// The name of the table
    fn name(&self) -> &'static str;

    /// Statements that create the table and its indexes
    fn create(&self) -> Vec<&'static str>;

    /// The SQL statement that removes every row
    fn truncate(&self) -> &'static str;
}

pub struct HistoryTable;

impl Table for HistoryTable {
    fn name(&self) -> &'static str {
        "oven_history"
    }

    fn create(&self) -> Vec<&'static str> {
        vec![
            r"
            CREATE TABLE IF NOT EXISTS oven_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                appliance_id TEXT NOT NULL,
                cook_id TEXT,
                updated_timestamp TEXT NOT NULL,
                dry REAL NOT NULL,
                dry_top REAL NOT NULL,
                dry_bottom REAL NOT NULL,
                wet REAL NOT NULL,
                wet_dosed INTEGER NOT NULL,
                temperature_mode TEXT NOT NULL,
                dry_setpoint REAL,
                wet_setpoint REAL,
                lamp_on INTEGER NOT NULL,
                lamp_preference INTEGER NOT NULL,
                vent_open INTEGER NOT NULL,
                door_closed INTEGER NOT NULL,
                water_tank_empty INTEGER NOT NULL,
                fan_speed INTEGER NOT NULL,
                heating_top_on INTEGER NOT NULL,
                heating_bottom_on INTEGER NOT NULL,
                heating_rear_on INTEGER NOT NULL,
                heating_top_watts INTEGER NOT NULL,
                heating_bottom_watts INTEGER NOT NULL,
                heating_rear_watts INTEGER NOT NULL,
                probe_connected INTEGER NOT NULL,
                probe REAL,
                probe_setpoint REAL,
                steam_mode TEXT NOT NULL,
                evaporator REAL NOT NULL,
                boiler REAL NOT NULL,
                boiler_dosed INTEGER NOT NULL,
                evaporator_watts INTEGER NOT NULL,
                boiler_watts INTEGER NOT NULL,
                relative_humidity REAL,
                relative_humidity_setpoint REAL,
                steam_percentage_setpoint REAL,
                timer_mode TEXT NOT NULL,
                timer_initial INTEGER NOT NULL,
                timer_current INTEGER NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS oven_history_updated_timestamp
                ON oven_history (updated_timestamp)",
            "CREATE INDEX IF NOT EXISTS oven_history_appliance_cook
                ON oven_history (appliance_id, cook_id)",
        ]
    }

    fn truncate(&self) -> &'static str {
        "DELETE FROM oven_history"
    }
}
