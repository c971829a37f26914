#[cfg(test)]
pub mod test {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct TestConfig {
        pub a: String,
        pub b: i32,
        pub b64: i64,
        pub c: f64,
        pub d: Vec<String>,
        pub e: Vec<i32>,
        pub f: bool,
    }

    impl TestConfig {
        /// The defaults used by most loader tests.
        pub fn defaults() -> Self {
            TestConfig {
                a: "default".into(),
                b: 123,
                b64: 0,
                c: 3.1415926,
                d: vec!["a".into(), "b".into()],
                e: vec![-1, 1],
                f: false,
            }
        }
    }

    pub const TEST_JSON: &str = r#"{
        "a": "from json",
        "b": -2,
        "b64": 1000000000000000,
        "c": 0.001,
        "d": ["10", "20", "30"],
        "e": [10, 20, 30]
    }"#;

    /// One field per semantic type.
    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct AllKinds {
        pub s: String,
        pub n: i32,
        pub wide: i64,
        pub x: f64,
        pub words: Vec<String>,
        pub nums: Vec<i32>,
        pub on: bool,
        pub bits: Vec<bool>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct WideConfig {
        pub small: i8,
        pub unsigned: u32,
        pub big: u64,
        pub ratio: f32,
        pub flags: Vec<bool>,
        pub ids: Vec<u16>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct HugeConfig {
        pub name: String,
        pub huge: i128,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct RenamedConfig {
        pub host: String,
        pub port: u16,
        #[serde(rename = "apis.search")]
        pub search_api: String,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct NestedConfig {
        pub a: String,
        pub nested: TestConfig,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct FloatListConfig {
        pub a: String,
        pub invalid_float: Vec<f32>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct SkipConfig {
        pub host: String,
        #[serde(skip)]
        pub cache: Vec<String>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
    pub struct OptionConfig {
        pub maybe: Option<String>,
    }
}
