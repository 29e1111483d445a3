#[derive(Debug, Clone, PartialEq)]
/// A replicated mutation record exchanged between the two trackers. The wire
/// verb carries a `synced_` prefix so a misrouted event can never be confused
/// with a client command.
pub enum SyncEvent {
    CreateUser {
        user_id: String,
        password: String,
    },
    Login {
        user_id: String,
        endpoint: String,
    },
    Logout {
        user_id: String,
        endpoint: String,
    },
    CreateGroup {
        group_id: String,
        owner_id: String,
    },
    JoinGroup {
        group_id: String,
        user_id: String,
    },
    LeaveGroup {
        group_id: String,
        user_id: String,
    },
    AcceptRequest {
        group_id: String,
        user_id: String,
    },
    /// Full post-image of an upload. The uploader endpoint is the LAST
    /// token on the wire; everything between the file hash and it is a
    /// piece hash in index order.
    Upload {
        group_id: String,
        filename: String,
        file_size: u64,
        file_hash: String,
        piece_hashes: Vec<String>,
        endpoint: String,
    },
    StopShare {
        group_id: String,
        filename: String,
        endpoint: String,
    },
    AddSeeder {
        group_id: String,
        filename: String,
        endpoint: String,
    },
}

impl SyncEvent {
    pub fn to_wire(&self) -> String {
        match self {
            SyncEvent::CreateUser { user_id, password } => {
                format!("synced_CREATE_USER {user_id} {password}")
            }
            SyncEvent::Login { user_id, endpoint } => {
                format!("synced_LOGIN {user_id} {endpoint}")
            }
            SyncEvent::Logout { user_id, endpoint } => {
                format!("synced_LOGOUT {user_id} {endpoint}")
            }
            SyncEvent::CreateGroup { group_id, owner_id } => {
                format!("synced_CREATE_GROUP {group_id} {owner_id}")
            }
            SyncEvent::JoinGroup { group_id, user_id } => {
                format!("synced_JOIN_GROUP {group_id} {user_id}")
            }
            SyncEvent::LeaveGroup { group_id, user_id } => {
                format!("synced_LEAVE_GROUP {group_id} {user_id}")
            }
            SyncEvent::AcceptRequest { group_id, user_id } => {
                format!("synced_ACCEPT_REQUEST {group_id} {user_id}")
            }
            SyncEvent::Upload {
                group_id,
                filename,
                file_size,
                file_hash,
                piece_hashes,
                endpoint,
            } => {
                let mut msg = format!("synced_UPLOAD {group_id} {filename} {file_size} {file_hash}");
                for hash in piece_hashes {
                    msg.push(' ');
                    msg.push_str(hash);
                }
                msg.push(' ');
                msg.push_str(endpoint);
                msg
            }
            SyncEvent::StopShare {
                group_id,
                filename,
                endpoint,
            } => {
                format!("synced_STOP_SHARE {group_id} {filename} {endpoint}")
            }
            SyncEvent::AddSeeder {
                group_id,
                filename,
                endpoint,
            } => {
                format!("synced_ADD_SEEDER {group_id} {filename} {endpoint}")
            }
        }
    }

    /// Parse a tokenized sync message; `None` for anything malformed, which
    /// the reader drops without applying.
    pub fn parse(tokens: &[String]) -> Option<SyncEvent> {
        let verb = tokens.first().map(String::as_str)?;
        match verb {
            "synced_CREATE_USER" if tokens.len() == 3 => Some(SyncEvent::CreateUser {
                user_id: tokens[1].clone(),
                password: tokens[2].clone(),
            }),
            "synced_LOGIN" if tokens.len() == 3 => Some(SyncEvent::Login {
                user_id: tokens[1].clone(),
                endpoint: tokens[2].clone(),
            }),
            "synced_LOGOUT" if tokens.len() == 3 => Some(SyncEvent::Logout {
                user_id: tokens[1].clone(),
                endpoint: tokens[2].clone(),
            }),
            "synced_CREATE_GROUP" if tokens.len() == 3 => Some(SyncEvent::CreateGroup {
                group_id: tokens[1].clone(),
                owner_id: tokens[2].clone(),
            }),
            "synced_JOIN_GROUP" if tokens.len() == 3 => Some(SyncEvent::JoinGroup {
                group_id: tokens[1].clone(),
                user_id: tokens[2].clone(),
            }),
            "synced_LEAVE_GROUP" if tokens.len() == 3 => Some(SyncEvent::LeaveGroup {
                group_id: tokens[1].clone(),
                user_id: tokens[2].clone(),
            }),
            "synced_ACCEPT_REQUEST" if tokens.len() == 3 => Some(SyncEvent::AcceptRequest {
                group_id: tokens[1].clone(),
                user_id: tokens[2].clone(),
            }),
            "synced_UPLOAD" if tokens.len() >= 6 => {
                let file_size = tokens[3].parse::<u64>().ok()?;
                Some(SyncEvent::Upload {
                    group_id: tokens[1].clone(),
                    filename: tokens[2].clone(),
                    file_size,
                    file_hash: tokens[4].clone(),
                    piece_hashes: tokens[5..tokens.len() - 1].to_vec(),
                    endpoint: tokens[tokens.len() - 1].clone(),
                })
            }
            "synced_STOP_SHARE" if tokens.len() == 4 => Some(SyncEvent::StopShare {
                group_id: tokens[1].clone(),
                filename: tokens[2].clone(),
                endpoint: tokens[3].clone(),
            }),
            "synced_ADD_SEEDER" if tokens.len() == 4 => Some(SyncEvent::AddSeeder {
                group_id: tokens[1].clone(),
                filename: tokens[2].clone(),
                endpoint: tokens[3].clone(),
            }),
            _ => None,
        }
    }
}
