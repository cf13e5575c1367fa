use crate::config;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Role selected by the binary's own name, or by a `server`/`client` first
/// argument when the binary runs under some other name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Server,
    Client { ip: String, port: String },
    Help,
    Version,
}

pub fn get_program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .unwrap_or_else(|| "myftp".to_string())
        .to_lowercase()
}

pub fn parse_role(args: &[String]) -> Role {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Role::Help;
    }
    if args.iter().any(|a| a == "-V" || a == "--version") {
        return Role::Version;
    }

    let prog = get_program_name();
    let (role, positional) = if prog == "server" || prog == "client" {
        (prog, &args[1..])
    } else if args.len() > 1 && (args[1] == "server" || args[1] == "client") {
        (args[1].clone(), &args[2..])
    } else {
        return Role::Help;
    };

    if role == "server" {
        Role::Server
    } else {
        Role::Client {
            ip: positional
                .first()
                .cloned()
                .unwrap_or_else(|| config::DEFAULT_CLIENT_IP.to_string()),
            port: positional
                .get(1)
                .cloned()
                .unwrap_or_else(|| config::DEFAULT_PORT.to_string()),
        }
    }
}

pub fn print_help() {
    let prog = get_program_name();
    println!(
        r#"{prog} {VERSION} - line-oriented file transfer service

USAGE:
    server                  Serve on 0.0.0.0:{port}, reading credentials.txt
                            from the working directory
    client [ip [port]]      Connect interactively (defaults {ip} {port})

SESSION COMMANDS (after login):
    get                     Download a file (saved locally as <name>.newsave)
    put                     Upload a file
    del                     Delete a remote file
    help                    List commands
    exit                    End the session
    <anything else>         Run as a shell pipeline, e.g. `ls | wc -l`;
                            output is sent back over the connection

ENVIRONMENT VARIABLES:
    MYFTP_BIND              Server bind address (default {bind})
    MYFTP_PORT              Server port (default {port})
    MYFTP_CREDENTIALS       Credential file path (default credentials.txt)
    RUST_LOG                Log filter (default info)

OPTIONS:
    -h, --help              Show this help message
    -V, --version           Show version information"#,
        bind = config::DEFAULT_BIND,
        ip = config::DEFAULT_CLIENT_IP,
        port = config::DEFAULT_PORT,
    );
}

pub fn print_version() {
    println!("{} {}", get_program_name(), VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    // the test binary is not named server/client, so the subcommand
    // fallback path is what these exercise

    #[test]
    fn test_subcommand_server() {
        assert_eq!(parse_role(&args(&["myftp", "server"])), Role::Server);
    }

    #[test]
    fn test_subcommand_client_defaults() {
        assert_eq!(
            parse_role(&args(&["myftp", "client"])),
            Role::Client {
                ip: "127.0.0.1".to_string(),
                port: "1234".to_string()
            }
        );
    }

    #[test]
    fn test_subcommand_client_positional_args() {
        assert_eq!(
            parse_role(&args(&["myftp", "client", "10.0.0.7", "4321"])),
            Role::Client {
                ip: "10.0.0.7".to_string(),
                port: "4321".to_string()
            }
        );
    }

    #[test]
    fn test_help_and_version_flags() {
        assert_eq!(parse_role(&args(&["myftp", "--help"])), Role::Help);
        assert_eq!(parse_role(&args(&["myftp", "server", "-V"])), Role::Version);
    }

    #[test]
    fn test_no_role_falls_back_to_help() {
        assert_eq!(parse_role(&args(&["myftp"])), Role::Help);
    }
}
