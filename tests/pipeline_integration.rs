//! Conversion pipeline integration tests
//!
//! Runs whole conversions against temporary roster and CSV fixtures and inspects the
//! metadata document and binary blob they produce.
//!
//! # Test Coverage
//!
//! - Per-device statistics, including last-wins ties on extrema
//! - Cumulative record offsets across devices
//! - Malformed, short and blank rows, stray quotes and invalid UTF-8
//! - Devices missing from the roster or from the input directory
//! - Reading each device's records back out of the blob via its metadata
//! - Both dataset profiles (AirNow floating, Speck integer)

use sensor_viz::config::{RunPlan, Settings};
use sensor_viz::data::binary::{BinaryLayout, DecodedRecord};
use sensor_viz::{pipeline, DatasetProfile, RunSummary};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// =============================================================================
// Test Helper Functions
// =============================================================================

/// Temporary input layout: `devices.csv`, `csv/<device>.csv`, and `out/`.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(roster: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("devices.csv"), roster).unwrap();
        std::fs::create_dir(dir.path().join("csv")).unwrap();
        Self { dir }
    }

    fn device_file(&self, name: &str, contents: impl AsRef<[u8]>) -> &Self {
        std::fs::write(self.dir.path().join("csv").join(name), contents).unwrap();
        self
    }

    fn plan(&self, settings: Settings) -> RunPlan {
        let root = self.dir.path();
        settings
            .plan(root.join("devices.csv"), root.join("csv"), root.join("out"))
            .unwrap()
    }

    fn run(&self, profile: DatasetProfile) -> (RunPlan, RunSummary) {
        let plan = self.plan(Settings {
            profile,
            ..Settings::default()
        });
        let summary = pipeline::run(&plan).unwrap();
        (plan, summary)
    }
}

fn read_metadata(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn devices(metadata: &Value) -> &Vec<Value> {
    metadata["devices"].as_array().unwrap()
}

fn device_records(plan: &RunPlan, entry: &Value) -> Vec<DecodedRecord> {
    let blob = std::fs::read(&plan.binary_path).unwrap();
    let layout = plan.profile.binary_layout();
    let offset = entry["recordOffset"].as_u64().unwrap() as usize;
    let count = entry["numRecords"].as_u64().unwrap() as usize;
    let slice = layout.device_slice(offset, count, &blob).unwrap();
    layout.decode_records(slice)
}

/// AirNow roster: lat, lon, parameter, unit, site id, site name.
const AIRNOW_ROSTER: &str = "\
latitude,longitude,parameter,unit,site,name
1.0,2.0,PM2.5,UG/M3,A,Alpha
40.4655,-79.9608,PM2.5,UG/M3,B,Bravo
";

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn single_device_statistics_use_last_tie() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file("A.csv", "time,value\n100,5.0\n200,7.0\n150,5.0\n");

    let (plan, summary) = fixture.run(DatasetProfile::AirNow);
    assert_eq!(summary.devices_written, 1);

    let metadata = read_metadata(&plan.metadata_path);
    assert_eq!(metadata["valueIntervalSecs"], 3600);
    let a = &devices(&metadata)[0];
    assert_eq!(a["name"], "A");
    assert_eq!(a["latitude"], 1.0);
    assert_eq!(a["longitude"], 2.0);
    assert_eq!(a["minTime"], 100);
    assert_eq!(a["maxTime"], 200);
    assert_eq!(a["minValue"], 5.0);
    assert_eq!(a["minValueTime"], 150);
    assert_eq!(a["maxValue"], 7.0);
    assert_eq!(a["maxValueTime"], 200);
    assert_eq!(a["numRecords"], 3);
    assert_eq!(a["recordOffset"], 0);
}

#[test]
fn second_device_offset_follows_first() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture
        .device_file("A.csv", "time,value\n1,1.0\n2,2.0\n3,3.0\n")
        .device_file("B.csv", "time,value\n4,4.5\n5,-5.5\n");

    let (plan, summary) = fixture.run(DatasetProfile::AirNow);
    assert_eq!(summary.records_written, 5);

    let metadata = read_metadata(&plan.metadata_path);
    let entries = devices(&metadata);
    assert_eq!(entries[0]["name"], "A");
    assert_eq!(entries[1]["name"], "B");
    assert_eq!(entries[1]["recordOffset"], 3);

    let blob = std::fs::read(&plan.binary_path).unwrap();
    assert_eq!(blob.len(), 5 * BinaryLayout::TimeAndScaledShort.record_width());

    let all = BinaryLayout::TimeAndScaledShort.decode_records(&blob);
    let timestamps: Vec<i32> = all.iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3, 4, 5]);
    assert_eq!(
        device_records(&plan, &entries[1]),
        vec![
            DecodedRecord { timestamp: 4, value: 45 },
            DecodedRecord { timestamp: 5, value: -55 },
        ]
    );
}

#[test]
fn malformed_short_and_blank_rows_are_dropped() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file(
        "A.csv",
        "time,value\n100,5.0\nx,y\n\n   \n300\n200,99.0,extra,columns\n250,abc\n",
    );

    let (plan, _) = fixture.run(DatasetProfile::AirNow);
    let metadata = read_metadata(&plan.metadata_path);
    let a = &devices(&metadata)[0];
    assert_eq!(a["numRecords"], 2);
    assert_eq!(a["maxValue"], 99.0);
    assert_eq!(a["maxTime"], 200);
    assert_eq!(
        device_records(&plan, a),
        vec![
            DecodedRecord { timestamp: 100, value: 50 },
            DecodedRecord { timestamp: 200, value: 990 },
        ]
    );
}

#[test]
fn stray_quote_drops_only_its_own_row() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file(
        "A.csv",
        "time,value\n100,5.0\n150,\"6.0\n200,7.0\n300,8.0\n400,9.0\n",
    );

    let (plan, _) = fixture.run(DatasetProfile::AirNow);
    let metadata = read_metadata(&plan.metadata_path);
    let a = &devices(&metadata)[0];
    assert_eq!(a["numRecords"], 4);
    assert_eq!(a["maxValue"], 9.0);
    assert_eq!(a["maxTime"], 400);
}

#[test]
fn invalid_utf8_drops_only_its_own_row() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file(
        "A.csv",
        b"time,value\n100,5.0\n150,6.0\xff\n200,7.0\n300,8.0\n".as_slice(),
    );

    let (plan, _) = fixture.run(DatasetProfile::AirNow);
    let metadata = read_metadata(&plan.metadata_path);
    let a = &devices(&metadata)[0];
    assert_eq!(a["numRecords"], 3);
    let timestamps: Vec<i32> = device_records(&plan, a).iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![100, 200, 300]);
}

#[test]
fn files_for_unknown_devices_are_ignored() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture
        .device_file("A.csv", "time,value\n1,1.0\n2,2.0\n")
        .device_file("AA.csv", "time,value\n1,1.0\n2,2.0\n3,3.0\n")
        .device_file("B.csv", "time,value\n9,9.0\n");

    let (plan, summary) = fixture.run(DatasetProfile::AirNow);
    assert_eq!(summary.devices_written, 2);

    let metadata = read_metadata(&plan.metadata_path);
    let names: Vec<&str> = devices(&metadata)
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(devices(&metadata)[1]["recordOffset"], 2);
}

#[test]
fn devices_without_files_consume_no_offset() {
    let roster = "\
latitude,longitude,parameter,unit,site,name
1,1,p,u,A,a
2,2,p,u,B,b
3,3,p,u,C,c
";
    let fixture = Fixture::new(roster);
    fixture
        .device_file("A.csv", "t,v\n1,1\n2,2\n")
        .device_file("C.csv", "t,v\n3,3\n");

    let (plan, summary) = fixture.run(DatasetProfile::AirNow);
    assert_eq!(summary.devices_skipped, 1);

    let metadata = read_metadata(&plan.metadata_path);
    let entries = devices(&metadata);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["name"], "C");
    assert_eq!(entries[1]["recordOffset"], 2);
}

#[test]
fn offsets_equal_prefix_sums_of_record_counts() {
    let roster = "\
latitude,longitude,parameter,unit,site,name
1,1,p,u,d0,x
1,1,p,u,d1,x
1,1,p,u,d2,x
1,1,p,u,d3,x
1,1,p,u,d4,x
";
    let fixture = Fixture::new(roster);
    for (i, count) in [4usize, 0, 7, 1, 3].iter().enumerate() {
        let mut contents = String::from("time,value\n");
        for t in 0..*count {
            contents.push_str(&format!("{},{}.5\n", 1000 + t, i));
        }
        fixture.device_file(&format!("d{i}.csv"), &contents);
    }

    let (plan, _) = fixture.run(DatasetProfile::AirNow);
    let metadata = read_metadata(&plan.metadata_path);

    let mut expected_offset = 0;
    for entry in devices(&metadata) {
        assert_eq!(entry["recordOffset"].as_u64().unwrap(), expected_offset);
        let records = device_records(&plan, entry);
        assert_eq!(records.len() as u64, entry["numRecords"].as_u64().unwrap());
        expected_offset += entry["numRecords"].as_u64().unwrap();
    }
    assert_eq!(expected_offset, 15);

    let blob = std::fs::metadata(&plan.binary_path).unwrap().len();
    assert_eq!(blob, 15 * 6);
}

#[test]
fn speck_profile_writes_integer_records() {
    let roster = "\
name,prettyName,row,col,details
speck1,Kitchen,3,7,second floor
speck2,,4,1
";
    let fixture = Fixture::new(roster);
    fixture
        .device_file("speck1.csv", "time,count\n10,4\n11,9\n12,4\n")
        .device_file("speck2.csv", "time,count\n10,100000\n");

    let (plan, _) = fixture.run(DatasetProfile::Speck);
    assert!(plan.metadata_path.ends_with("speck_12x12_metadata.json"));

    let metadata = read_metadata(&plan.metadata_path);
    assert_eq!(metadata["valueIntervalSecs"], 1);
    let entries = devices(&metadata);

    let first = &entries[0];
    assert_eq!(first["prettyName"], "Kitchen");
    assert_eq!(first["row"], 3);
    assert_eq!(first["col"], 7);
    assert_eq!(first["locationDetails"], "second floor");
    assert_eq!(first["minValue"], 4);
    assert_eq!(first["minValueTime"], 12);
    assert_eq!(first["maxValue"], 9);
    assert!(first["minValue"].is_i64());

    let second = &entries[1];
    assert!(second.get("prettyName").is_none());
    assert_eq!(second["recordOffset"], 3);
    assert_eq!(
        device_records(&plan, second),
        vec![DecodedRecord { timestamp: 10, value: 100000 }]
    );
    assert_eq!(std::fs::metadata(&plan.binary_path).unwrap().len(), 4 * 8);
}

#[test]
fn configured_interval_and_file_names_are_used() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file("A.csv", "time,value\n1,1.0\n");

    let plan = fixture.plan(Settings {
        value_interval_secs: Some(900),
        metadata_file: Some("meta.json".into()),
        binary_file: Some("blob.bin".into()),
        ..Settings::default()
    });
    pipeline::run(&plan).unwrap();

    let out = fixture.dir.path().join("out");
    assert!(out.join("blob.bin").is_file());
    let metadata = read_metadata(&out.join("meta.json"));
    assert_eq!(metadata["valueIntervalSecs"], 900);
}

#[test]
fn rerun_overwrites_previous_outputs() {
    let fixture = Fixture::new(AIRNOW_ROSTER);
    fixture.device_file("A.csv", "time,value\n1,1.0\n2,2.0\n");
    let (plan, _) = fixture.run(DatasetProfile::AirNow);

    fixture.device_file("A.csv", "time,value\n1,1.0\n");
    pipeline::run(&plan).unwrap();

    assert_eq!(std::fs::metadata(&plan.binary_path).unwrap().len(), 6);
    let metadata = read_metadata(&plan.metadata_path);
    assert_eq!(devices(&metadata)[0]["numRecords"], 1);
}
