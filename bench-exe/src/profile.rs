//  PROFILE.rs
//    by Lut99
//
//  Created:
//    20 Feb 2023, 10:31:12
//  Last edited:
//    27 Feb 2023, 11:58:40
//  Auto updated?
//    Yes
//
//  Description:
//!   Defines the workload profile: which workload to run for which role,
//!   how the roles coordinate and how patiently they wait for each other.
//

use std::fs::File;
use std::io::Read;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bench_tsk::polling::PollingOptions;
use bench_tsk::process::CommandSpec;
use specifications::properties::Properties;
use specifications::role::Role;
use specifications::state::ServerState;

pub use crate::errors::ProfileError as Error;
use crate::parser::RegexMetricsParser;


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    const PROFILE: &str = r#"
name: redis
server_port: 6379
polling:
  interval_secs: 2
  timeout_secs: 60
server:
  path: redis-server
  args: [ "--port", "{ServerPort}", "--bind", "{ServerIp}" ]
client:
  path: memtier
  args: [ "--server={ServerIp}", "--port={ServerPort}", "--test-time={Property:Duration}" ]
  working_dir: /tmp
metrics:
  client: '(?P<name>\w+): (?P<value>[0-9.]+) (?P<unit>\w+)'
instructions:
  Duration: 30
"#;

    fn vars(props: &Properties) -> TemplateVars<'_> {
        TemplateVars { server_ip: IpAddr::V4(Ipv4Addr::new(1, 2, 3, 5)), server_port: 6379, client_ip: IpAddr::V4(Ipv4Addr::new(1, 2, 3, 4)), properties: props }
    }

    #[test]
    fn profile_parse_defaults() {
        let profile: WorkloadProfile = WorkloadProfile::from_reader(PROFILE.as_bytes()).unwrap();
        assert_eq!(profile.name, "redis");
        assert_eq!(profile.supported_roles, vec![ Role::Client, Role::Server ]);
        assert_eq!(profile.coordination, CoordinationMode::State);
        assert_eq!(profile.state_key, ServerState::KEY);
        assert_eq!(profile.polling.options(), PollingOptions::new(Duration::from_secs(2), Duration::from_secs(60)));
        assert!(profile.supports(&"SERVER".parse().unwrap()));
        assert!(profile.metrics_parser(&Role::Client).unwrap().is_some());
        assert!(profile.metrics_parser(&Role::Server).unwrap().is_none());
    }

    #[test]
    fn profile_render_command() {
        let profile: WorkloadProfile = WorkloadProfile::from_reader(PROFILE.as_bytes()).unwrap();
        let spec: CommandSpec = profile.command(&Role::Client).unwrap().render(&vars(&profile.instructions)).unwrap();
        assert_eq!(spec.command_line(), "memtier --server=1.2.3.5 --port=6379 --test-time=30");
        assert_eq!(spec.working_dir, Some(PathBuf::from("/tmp")));

        let spec: CommandSpec = profile.command(&Role::Server).unwrap().render(&vars(&Properties::new())).unwrap();
        assert_eq!(spec.args, vec![ "--port", "6379", "--bind", "1.2.3.5" ]);
    }

    #[test]
    fn profile_template_errors() {
        let props: Properties = Properties::new().with("scenario", "ping-pong");
        assert_eq!(render_template("-s {property:Scenario} {{literal}}", &vars(&props)).unwrap(), "-s ping-pong {literal}");
        assert_eq!(render_template("{clientip}", &vars(&props)).unwrap(), "1.2.3.4");
        assert!(matches!(render_template("{ServerIp", &vars(&props)), Err(Error::UnterminatedPlaceholder{ .. })));
        assert!(matches!(render_template("{ServerName}", &vars(&props)), Err(Error::UnknownPlaceholder{ .. })));
        assert!(matches!(render_template("{Property:Protocol}", &vars(&props)), Err(Error::MissingProperty{ .. })));
    }

    #[test]
    fn profile_validation() {
        let raw: String = PROFILE.replace("interval_secs: 2", "interval_secs: 0");
        assert!(matches!(WorkloadProfile::from_reader(raw.as_bytes()), Err(Error::ZeroInterval{ .. })));
        let raw: String = format!("{}\nsupported_roles: []\n", PROFILE);
        assert!(matches!(WorkloadProfile::from_reader(raw.as_bytes()), Err(Error::NoSupportedRoles{ .. })));
        let raw: String = PROFILE.replace("(?P<unit>\\w+)", "(?P<unit>\\w+");
        assert!(matches!(WorkloadProfile::from_reader(raw.as_bytes()), Err(Error::IllegalMetricsPattern{ .. })));
    }
}





/***** HELPER FUNCTIONS *****/
#[inline]
fn default_supported_roles() -> Vec<Role> { vec![ Role::Client, Role::Server ] }

#[inline]
fn default_state_key() -> String { ServerState::KEY.into() }

#[inline]
fn default_interval_secs() -> u64 { 1 }

#[inline]
fn default_timeout_secs() -> u64 { 300 }





/***** LIBRARY *****/
/// Defines how the two roles coordinate.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinationMode {
    /// The server publishes a state document that the client polls for.
    #[default]
    State,
    /// The client pushes instructions to the server.
    Instructions,
}



/// Defines how patiently a client waits for its server.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PollingConfig {
    /// The time between two polls, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs : u64,
    /// The time after which we stop waiting, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs  : u64,
}

impl PollingConfig {
    /// Returns the PollingOptions described by this config.
    #[inline]
    pub fn options(&self) -> PollingOptions { PollingOptions::new(Duration::from_secs(self.interval_secs), Duration::from_secs(self.timeout_secs)) }
}

impl Default for PollingConfig {
    #[inline]
    fn default() -> Self { Self { interval_secs: default_interval_secs(), timeout_secs: default_timeout_secs() } }
}



/// The metrics patterns per role.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MetricsConfig {
    /// The pattern that extracts metrics from the output of the server workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server : Option<String>,
    /// The pattern that extracts metrics from the output of the client workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client : Option<String>,
}



/// The values that may be substituted in command templates.
#[derive(Clone, Copy, Debug)]
pub struct TemplateVars<'p> {
    /// Substituted for `{ServerIp}`.
    pub server_ip   : IpAddr,
    /// Substituted for `{ServerPort}`.
    pub server_port : u16,
    /// Substituted for `{ClientIp}`.
    pub client_ip   : IpAddr,
    /// Looked up by `{Property:<name>}`.
    pub properties  : &'p Properties,
}

/// Substitutes the placeholders in the given template.
///
/// Placeholder names are case-insensitive. Use `{{` and `}}` for literal braces.
///
/// # Errors
/// This function errors if a placeholder is malformed, unknown or refers to an absent property.
pub fn render_template(template: &str, vars: &TemplateVars) -> Result<String, Error> {
    let mut res: String = String::with_capacity(template.len());
    let mut rest: &str = template;
    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        res.push_str(&rest[..pos]);
        let brace: char = rest[pos..].chars().next().unwrap_or('{');
        rest = &rest[pos + 1..];

        // Escaped braces
        if rest.starts_with(brace) {
            res.push(brace);
            rest = &rest[1..];
            continue;
        }
        if brace == '}' { res.push('}'); continue; }

        // Placeholder
        let end: usize = match rest.find('}') {
            Some(end) => end,
            None      => { return Err(Error::UnterminatedPlaceholder{ template: template.into() }); },
        };
        let name: &str = rest[..end].trim();
        rest = &rest[end + 1..];
        let lower: String = name.to_lowercase();
        match lower.as_str() {
            "serverip"   => res.push_str(&vars.server_ip.to_string()),
            "serverport" => res.push_str(&vars.server_port.to_string()),
            "clientip"   => res.push_str(&vars.client_ip.to_string()),
            _ if lower.starts_with("property:") => {
                let prop: &str = name["property:".len()..].trim();
                match vars.properties.get(prop) {
                    Some(Value::String(value)) => res.push_str(value),
                    Some(value)                => res.push_str(&value.to_string()),
                    None                       => { return Err(Error::MissingProperty{ template: template.into(), name: prop.into() }); },
                }
            },
            _ => { return Err(Error::UnknownPlaceholder{ template: template.into(), name: name.into() }); },
        }
    }
    res.push_str(rest);
    Ok(res)
}



/// Describes the command of one role, with placeholders in its arguments.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CommandTemplate {
    /// The binary to run.
    pub path        : PathBuf,
    /// The argument templates.
    #[serde(default)]
    pub args        : Vec<String>,
    /// The directory to run in, if not the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir : Option<PathBuf>,
}

impl CommandTemplate {
    /// Renders the template to a concrete command.
    ///
    /// # Errors
    /// This function errors if any of the arguments fails to render.
    pub fn render(&self, vars: &TemplateVars) -> Result<CommandSpec, Error> {
        let args: Vec<String> = self.args.iter().map(|arg| render_template(arg, vars)).collect::<Result<_, _>>()?;
        let mut spec: CommandSpec = CommandSpec::new(&self.path, args);
        spec.working_dir = self.working_dir.clone();
        Ok(spec)
    }
}



/// Defines a workload and how its roles run it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WorkloadProfile {
    /// The name of the workload.
    pub name            : String,
    /// The roles this workload may be run as.
    #[serde(default = "default_supported_roles")]
    pub supported_roles : Vec<Role>,
    /// How the roles coordinate.
    #[serde(default)]
    pub coordination    : CoordinationMode,
    /// The key of the state document the server publishes.
    #[serde(default = "default_state_key")]
    pub state_key       : String,
    /// The port on which the server workload listens.
    pub server_port     : u16,
    /// How patiently the client waits for the server.
    #[serde(default)]
    pub polling         : PollingConfig,

    /// The command of the server role.
    pub server          : CommandTemplate,
    /// The command of the client role.
    pub client          : CommandTemplate,
    /// How to extract metrics from the output of either role.
    #[serde(default)]
    pub metrics         : MetricsConfig,
    /// The properties the client sends along with the instruction to start.
    #[serde(default)]
    pub instructions    : Properties,
}

impl WorkloadProfile {
    /// Loads a WorkloadProfile from the given YAML file.
    ///
    /// # Arguments
    /// - `path`: The path to load the profile from.
    ///
    /// # Returns
    /// A new, validated WorkloadProfile.
    ///
    /// # Errors
    /// This function errors if we failed to read the file, it is not valid YAML for a profile, or it does not validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path: &Path = path.as_ref();
        debug!("Loading workload profile '{}'...", path.display());

        let handle: File = match File::open(path) {
            Ok(handle) => handle,
            Err(err)   => { return Err(Error::FileOpenError{ path: path.into(), err }); },
        };
        let profile: Self = match serde_yaml::from_reader(handle) {
            Ok(profile) => profile,
            Err(err)    => { return Err(Error::FileParseError{ path: path.into(), err }); },
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Loads a WorkloadProfile from the given reader.
    ///
    /// # Errors
    /// This function errors if the reader does not contain valid YAML for a profile, or it does not validate.
    pub fn from_reader(reader: impl Read) -> Result<Self, Error> {
        let profile: Self = match serde_yaml::from_reader(reader) {
            Ok(profile) => profile,
            Err(err)    => { return Err(Error::ReaderParseError{ err }); },
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Checks that the profile is usable.
    ///
    /// # Errors
    /// This function errors if no roles are supported, the polling interval is zero or a metrics pattern is illegal.
    pub fn validate(&self) -> Result<(), Error> {
        if self.supported_roles.is_empty() { return Err(Error::NoSupportedRoles{ name: self.name.clone() }); }
        if self.polling.interval_secs == 0 { return Err(Error::ZeroInterval{ name: self.name.clone() }); }
        for pattern in [ &self.metrics.server, &self.metrics.client ].into_iter().flatten() {
            RegexMetricsParser::new(pattern)?;
        }
        Ok(())
    }



    /// Returns whether the profile may be run as the given role.
    #[inline]
    pub fn supports(&self, role: &Role) -> bool { self.supported_roles.contains(role) }

    /// Returns the command template of the given role, if it has one.
    #[inline]
    pub fn command(&self, role: &Role) -> Option<&CommandTemplate> {
        match role {
            Role::Client   => Some(&self.client),
            Role::Server   => Some(&self.server),
            Role::Other(_) => None,
        }
    }

    /// Returns the metrics parser for the output of the given role, if the profile defines one.
    ///
    /// # Errors
    /// This function errors if the pattern is illegal.
    pub fn metrics_parser(&self, role: &Role) -> Result<Option<RegexMetricsParser>, Error> {
        let pattern: Option<&String> = match role {
            Role::Client   => self.metrics.client.as_ref(),
            Role::Server   => self.metrics.server.as_ref(),
            Role::Other(_) => None,
        };
        pattern.map(|p| RegexMetricsParser::new(p)).transpose()
    }
}
