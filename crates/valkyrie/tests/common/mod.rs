use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn write_descriptor(&self, content: &str) {
        let path = self.root.path().join("valkconfig.json");
        fs::write(path, content).unwrap();
    }

    /// Descriptor of a project with one fully provisioned environment
    pub fn deployed_descriptor() -> String {
        serde_json::json!({
            "Project": { "Name": "demo", "Region": "eu-west-1" },
            "LocalEnv": "staging",
            "Environments": {
                "staging": {
                    "Iam": {
                        "RoleName": "demo-staging-lambda",
                        "PolicyArn": "arn:aws:iam::123456789012:policy/valkyrie/staging/demo-staging-lambda"
                    },
                    "Lambda": {
                        "FunctionName": "demo-staging",
                        "Handler": "index.handler",
                        "MemorySize": 128,
                        "Timeout": 3,
                        "Runtime": "nodejs22.x",
                        "Environment": { "Variables": { "NODE_ENV": "staging" } }
                    },
                    "Api": { "Id": "abc123", "ResourceId": "res1" },
                    "EnvColor": "cyan",
                    "Confirm": false
                }
            }
        })
        .to_string()
    }
}
