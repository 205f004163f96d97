//! The `Runner` entity: a user-supplied script plus its interpreter metadata.

use serde::{Deserialize, Serialize};

/// Interpreter family for a runner file. The type tag strings are
/// bit-exact with the values the agent's dependency installer matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    Python,
    PythonAgent,
    PythonSeleniumFirefox,
    PythonSeleniumChrome,
    NodePuppeteer,
}

impl RunnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerType::Python => "python",
            RunnerType::PythonAgent => "python_agent",
            RunnerType::PythonSeleniumFirefox => "python_selenium_firefox",
            RunnerType::PythonSeleniumChrome => "python_selenium_chrome",
            RunnerType::NodePuppeteer => "node_puppeteer",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "python" => Some(RunnerType::Python),
            "python_agent" => Some(RunnerType::PythonAgent),
            "python_selenium_firefox" => Some(RunnerType::PythonSeleniumFirefox),
            "python_selenium_chrome" => Some(RunnerType::PythonSeleniumChrome),
            "node_puppeteer" => Some(RunnerType::NodePuppeteer),
            _ => None,
        }
    }

    /// Default interpreter executable for this runner type, absent a
    /// custom executable override on the runner record.
    pub fn default_executable(&self) -> &'static str {
        match self {
            RunnerType::Python | RunnerType::PythonAgent | RunnerType::PythonSeleniumFirefox
            | RunnerType::PythonSeleniumChrome => "python3",
            RunnerType::NodePuppeteer => "node",
        }
    }

    /// Dependency manifest file name the agent writes out before installing.
    pub fn manifest_file_name(&self) -> &'static str {
        match self {
            RunnerType::Python | RunnerType::PythonAgent | RunnerType::PythonSeleniumFirefox
            | RunnerType::PythonSeleniumChrome => "requirements.txt",
            RunnerType::NodePuppeteer => "package.json",
        }
    }

    /// Shell command used to install dependencies from the manifest file.
    pub fn install_command(&self) -> &'static str {
        match self {
            RunnerType::Python | RunnerType::PythonAgent | RunnerType::PythonSeleniumFirefox
            | RunnerType::PythonSeleniumChrome => "python3 -m pip install -r requirements.txt",
            RunnerType::NodePuppeteer => "npm install",
        }
    }
}

/// A user-supplied script the agent downloads, writes to disk, and launches
/// as a child process against each assigned task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    pub id: i64,
    pub contents: String,
    pub file_name: String,
    pub file_type: RunnerType,
    pub custom_executable: Option<String>,
    pub dependency_file: Option<String>,
}

impl Runner {
    /// The interpreter actually used to launch this runner: the custom
    /// executable if set, else the type's default.
    pub fn executable(&self) -> &str {
        self.custom_executable
            .as_deref()
            .unwrap_or_else(|| self.file_type.default_executable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_type_round_trips_through_string() {
        for t in [
            RunnerType::Python,
            RunnerType::PythonAgent,
            RunnerType::PythonSeleniumFirefox,
            RunnerType::PythonSeleniumChrome,
            RunnerType::NodePuppeteer,
        ] {
            assert_eq!(RunnerType::parse_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn install_commands_match_table() {
        assert_eq!(
            RunnerType::Python.install_command(),
            "python3 -m pip install -r requirements.txt"
        );
        assert_eq!(RunnerType::NodePuppeteer.install_command(), "npm install");
        assert_eq!(RunnerType::Python.manifest_file_name(), "requirements.txt");
        assert_eq!(RunnerType::NodePuppeteer.manifest_file_name(), "package.json");
    }

    #[test]
    fn custom_executable_overrides_default() {
        let r = Runner {
            id: 1,
            contents: "print('hello')".to_string(),
            file_name: "main_runner.py".to_string(),
            file_type: RunnerType::Python,
            custom_executable: Some("python3.11".to_string()),
            dependency_file: None,
        };
        assert_eq!(r.executable(), "python3.11");
    }

    #[test]
    fn default_executable_used_when_no_override() {
        let r = Runner {
            id: 1,
            contents: "print('hello')".to_string(),
            file_name: "main_runner.py".to_string(),
            file_type: RunnerType::Python,
            custom_executable: None,
            dependency_file: None,
        };
        assert_eq!(r.executable(), "python3");
    }
}
