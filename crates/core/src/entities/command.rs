#[derive(Debug, Clone, PartialEq)]
/// A control-plane request, one per tracker verb. Parsed from the
/// whitespace-tokenized wire form; the parse error is the usage line
/// the tracker sends back.
pub enum Command {
    CreateUser {
        user_id: String,
        password: String,
    },
    Login {
        user_id: String,
        password: String,
        seeder_port: u16,
    },
    /// The user id is optional on the wire; when absent the tracker uses
    /// the socket binding.
    Logout {
        user_id: Option<String>,
    },
    CreateGroup {
        group_id: String,
    },
    JoinGroup {
        group_id: String,
    },
    LeaveGroup {
        group_id: String,
    },
    ListRequests {
        group_id: String,
    },
    AcceptRequest {
        group_id: String,
        user_id: String,
    },
    ListGroups,
    ListFiles {
        group_id: String,
    },
    UploadFile {
        group_id: String,
        filename: String,
        file_size: u64,
        file_hash: String,
        piece_hashes: Vec<String>,
    },
    DownloadFile {
        group_id: String,
        filename: String,
    },
    StopShare {
        group_id: String,
        filename: String,
    },
    IAmSeeder {
        group_id: String,
        filename: String,
    },
}

impl Command {
    /// Parse a tokenized control message.
    pub fn parse(tokens: &[String]) -> Result<Command, String> {
        let verb = tokens.first().map(String::as_str).unwrap_or("");
        match verb {
            "create_user" => {
                if tokens.len() != 3 {
                    return Err("Usage: create_user <user_id> <password>".into());
                }
                Ok(Command::CreateUser {
                    user_id: tokens[1].clone(),
                    password: tokens[2].clone(),
                })
            }
            "login" => {
                if tokens.len() != 4 {
                    return Err("Usage: login <user_id> <password> <port>".into());
                }
                let seeder_port = tokens[3]
                    .parse::<u16>()
                    .map_err(|_| String::from("Usage: login <user_id> <password> <port>"))?;
                Ok(Command::Login {
                    user_id: tokens[1].clone(),
                    password: tokens[2].clone(),
                    seeder_port,
                })
            }
            "logout" => Ok(Command::Logout {
                user_id: tokens.get(1).cloned(),
            }),
            "create_group" => {
                if tokens.len() != 2 {
                    return Err("Usage: create_group <group_id>".into());
                }
                Ok(Command::CreateGroup {
                    group_id: tokens[1].clone(),
                })
            }
            "join_group" => {
                if tokens.len() != 2 {
                    return Err("Usage: join_group <group_id>".into());
                }
                Ok(Command::JoinGroup {
                    group_id: tokens[1].clone(),
                })
            }
            "leave_group" => {
                if tokens.len() != 2 {
                    return Err("Usage: leave_group <group_id>".into());
                }
                Ok(Command::LeaveGroup {
                    group_id: tokens[1].clone(),
                })
            }
            "list_requests" => {
                if tokens.len() != 2 {
                    return Err("Usage: list_requests <group_id>".into());
                }
                Ok(Command::ListRequests {
                    group_id: tokens[1].clone(),
                })
            }
            "accept_request" => {
                if tokens.len() != 3 {
                    return Err("Usage: accept_request <group_id> <user_id>".into());
                }
                Ok(Command::AcceptRequest {
                    group_id: tokens[1].clone(),
                    user_id: tokens[2].clone(),
                })
            }
            "list_groups" => Ok(Command::ListGroups),
            "list_files" => {
                if tokens.len() != 2 {
                    return Err("Usage: list_files <group_id>".into());
                }
                Ok(Command::ListFiles {
                    group_id: tokens[1].clone(),
                })
            }
            "upload_file" => {
                // upload_file <group> <name> <size> <hash> <piece hashes...>
                if tokens.len() < 5 {
                    return Err("Invalid upload command format.".into());
                }
                let file_size = tokens[3]
                    .parse::<u64>()
                    .map_err(|_| String::from("Invalid upload command format."))?;
                Ok(Command::UploadFile {
                    group_id: tokens[1].clone(),
                    filename: tokens[2].clone(),
                    file_size,
                    file_hash: tokens[4].clone(),
                    piece_hashes: tokens[5..].to_vec(),
                })
            }
            "download_file" => {
                if tokens.len() != 3 {
                    return Err("Usage: download_file <group_id> <file_name>".into());
                }
                Ok(Command::DownloadFile {
                    group_id: tokens[1].clone(),
                    filename: tokens[2].clone(),
                })
            }
            "stop_share" => {
                if tokens.len() != 3 {
                    return Err("Usage: stop_share <group_id> <file_name>".into());
                }
                Ok(Command::StopShare {
                    group_id: tokens[1].clone(),
                    filename: tokens[2].clone(),
                })
            }
            "i_am_seeder" => {
                if tokens.len() != 3 {
                    return Err("Usage: i_am_seeder <group_id> <file_name>".into());
                }
                Ok(Command::IAmSeeder {
                    group_id: tokens[1].clone(),
                    filename: tokens[2].clone(),
                })
            }
            _ => Err("Invalid command".into()),
        }
    }
}
