use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use gshare_core::entities::{Command, Reply, SyncEvent};

use super::{FileInfo, Group};
use crate::LOGGER;

#[derive(Debug, Clone)]
/// One logged-in user. `conn_id` is the owning control connection; it is
/// `None` for sessions learned over the sync channel, which have no local
/// socket.
pub struct Session {
    pub endpoint: String,
    pub conn_id: Option<u64>,
}

#[derive(Debug)]
/// What a control worker does with the result of one command: answer the
/// client, forward the event to the peer tracker, and shut down an evicted
/// connection if a re-login displaced one.
pub struct CommandOutcome {
    pub reply: Reply,
    pub event: Option<SyncEvent>,
    pub evicted_conn: Option<u64>,
}

impl CommandOutcome {
    fn reply(reply: Reply) -> Self {
        CommandOutcome {
            reply,
            event: None,
            evicted_conn: None,
        }
    }

    fn replicated(reply: Reply, event: SyncEvent) -> Self {
        CommandOutcome {
            reply,
            event: Some(event),
            evicted_conn: None,
        }
    }
}

/// The replicated tracker directory. Four tables, each behind its own
/// mutex; any operation that holds more than one acquires them in the
/// fixed order users -> sessions -> socket_users -> groups.
pub struct Directory {
    users: Mutex<HashMap<String, String>>,
    sessions: Mutex<HashMap<String, Session>>,
    socket_users: Mutex<HashMap<u64, String>>,
    groups: Mutex<BTreeMap<String, Group>>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Directory {
            users: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            socket_users: Mutex::new(HashMap::new()),
            groups: Mutex::new(BTreeMap::new()),
        }
    }

    /// The user bound to a control connection, if any.
    pub fn user_for_conn(&self, conn_id: u64) -> Option<String> {
        self.socket_users.lock().unwrap().get(&conn_id).cloned()
    }

    /// The endpoint a user logged in from, if a session exists.
    pub fn endpoint_for_user(&self, user_id: &str) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(user_id)
            .map(|s| s.endpoint.clone())
    }

    /// Run one client command against the directory. `client_ip` is the
    /// address the control connection was accepted from; it forms the
    /// seeder endpoint together with the port sent in `login`.
    pub fn execute(&self, conn_id: u64, client_ip: &str, cmd: Command) -> CommandOutcome {
        let caller = self.user_for_conn(conn_id);
        match cmd {
            Command::CreateUser { user_id, password } => self.create_user(&user_id, &password),
            Command::Login {
                user_id,
                password,
                seeder_port,
            } => {
                let endpoint = format!("{client_ip}:{seeder_port}");
                self.login(&user_id, &password, &endpoint, conn_id)
            }
            Command::Logout { user_id } => {
                self.logout(conn_id, user_id.as_deref().or(caller.as_deref()))
            }
            Command::CreateGroup { group_id } => self.create_group(caller.as_deref(), &group_id),
            Command::JoinGroup { group_id } => self.join_group(caller.as_deref(), &group_id),
            Command::LeaveGroup { group_id } => self.leave_group(caller.as_deref(), &group_id),
            Command::ListRequests { group_id } => {
                self.list_requests(caller.as_deref(), &group_id)
            }
            Command::AcceptRequest { group_id, user_id } => {
                self.accept_request(caller.as_deref(), &group_id, &user_id)
            }
            Command::ListGroups => self.list_groups(),
            Command::ListFiles { group_id } => self.list_files(&group_id),
            Command::UploadFile {
                group_id,
                filename,
                file_size,
                file_hash,
                piece_hashes,
            } => self.upload_file(
                caller.as_deref(),
                &group_id,
                &filename,
                file_size,
                &file_hash,
                piece_hashes,
            ),
            Command::DownloadFile { group_id, filename } => {
                self.download_file(caller.as_deref(), &group_id, &filename)
            }
            Command::StopShare { group_id, filename } => {
                self.stop_share(caller.as_deref(), &group_id, &filename)
            }
            Command::IAmSeeder { group_id, filename } => {
                self.i_am_seeder(caller.as_deref(), &group_id, &filename)
            }
        }
    }

    fn create_user(&self, user_id: &str, password: &str) -> CommandOutcome {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(user_id) {
            return CommandOutcome::reply(Reply::error("User already exists"));
        }
        users.insert(user_id.to_owned(), password.to_owned());
        LOGGER.info(format!("User {user_id} created."));
        CommandOutcome::replicated(
            Reply::success("User created"),
            SyncEvent::CreateUser {
                user_id: user_id.to_owned(),
                password: password.to_owned(),
            },
        )
    }

    fn login(&self, user_id: &str, password: &str, endpoint: &str, conn_id: u64) -> CommandOutcome {
        let users = self.users.lock().unwrap();
        if users.get(user_id).map(String::as_str) != Some(password) {
            return CommandOutcome::reply(Reply::error("Invalid credentials"));
        }

        let mut sessions = self.sessions.lock().unwrap();
        let mut socket_users = self.socket_users.lock().unwrap();

        // A prior session for this user is evicted atomically: the old
        // connection loses its binding here, and the worker shuts its
        // socket down once the locks are released. A re-login on the same
        // connection evicts nothing.
        let evicted_conn = sessions
            .get(user_id)
            .and_then(|s| s.conn_id)
            .filter(|old_conn| *old_conn != conn_id);
        if let Some(old_conn) = evicted_conn {
            socket_users.remove(&old_conn);
            LOGGER.info(format!(
                "User {user_id} is re-establishing session from a new connection."
            ));
        }

        sessions.insert(
            user_id.to_owned(),
            Session {
                endpoint: endpoint.to_owned(),
                conn_id: Some(conn_id),
            },
        );
        socket_users.insert(conn_id, user_id.to_owned());
        LOGGER.info(format!("User {user_id} logged in from {endpoint}"));

        CommandOutcome {
            reply: Reply::success("Login successful"),
            event: Some(SyncEvent::Login {
                user_id: user_id.to_owned(),
                endpoint: endpoint.to_owned(),
            }),
            evicted_conn,
        }
    }

    fn logout(&self, conn_id: u64, user_id: Option<&str>) -> CommandOutcome {
        let user_id = match user_id {
            Some(user_id) => user_id.to_owned(),
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };

        let endpoint;
        {
            let mut sessions = self.sessions.lock().unwrap();
            let mut socket_users = self.socket_users.lock().unwrap();
            endpoint = sessions
                .remove(&user_id)
                .map(|s| s.endpoint)
                .unwrap_or_default();
            socket_users.remove(&conn_id);
        }

        self.purge_seeder(&endpoint);
        LOGGER.info(format!("User {user_id} logged out."));
        CommandOutcome::replicated(
            Reply::success("Logout successful"),
            SyncEvent::Logout { user_id, endpoint },
        )
    }

    /// Control-connection close: implicit logout for the bound user. An
    /// evicted connection has no binding left and cleans up to nothing.
    pub fn disconnect(&self, conn_id: u64) -> Option<SyncEvent> {
        let user_id = self.user_for_conn(conn_id)?;
        self.logout(conn_id, Some(&user_id)).event
    }

    fn create_group(&self, caller: Option<&str>, group_id: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(group_id) {
            return CommandOutcome::reply(Reply::error("Group already exists."));
        }
        groups.insert(
            group_id.to_owned(),
            Group::new(group_id.to_owned(), caller.to_owned()),
        );
        LOGGER.info(format!("Group {group_id} created by {caller}."));
        CommandOutcome::replicated(
            Reply::success("Group created."),
            SyncEvent::CreateGroup {
                group_id: group_id.to_owned(),
                owner_id: caller.to_owned(),
            },
        )
    }

    fn join_group(&self, caller: Option<&str>, group_id: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };
        let mut groups = self.groups.lock().unwrap();
        let group = match groups.get_mut(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if group.members.contains(caller) {
            return CommandOutcome::reply(Reply::error("You are already a member."));
        }
        group.pending_requests.insert(caller.to_owned());
        LOGGER.info(format!("User {caller} requested to join {group_id}."));
        CommandOutcome::replicated(
            Reply::success("Join request sent."),
            SyncEvent::JoinGroup {
                group_id: group_id.to_owned(),
                user_id: caller.to_owned(),
            },
        )
    }

    fn leave_group(&self, caller: Option<&str>, group_id: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };
        let mut groups = self.groups.lock().unwrap();
        let group = match groups.get_mut(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if !group.members.contains(caller) {
            return CommandOutcome::reply(Reply::error("You are not a member of this group."));
        }
        if group.owner_id == caller {
            return CommandOutcome::reply(Reply::error("Owner cannot leave the group."));
        }
        group.members.remove(caller);
        LOGGER.info(format!("User {caller} left {group_id}."));
        CommandOutcome::replicated(
            Reply::success("You have left the group."),
            SyncEvent::LeaveGroup {
                group_id: group_id.to_owned(),
                user_id: caller.to_owned(),
            },
        )
    }

    fn list_requests(&self, caller: Option<&str>, group_id: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };
        let groups = self.groups.lock().unwrap();
        let group = match groups.get(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if group.owner_id != caller {
            return CommandOutcome::reply(Reply::error("You are not the owner of this group."));
        }
        let payload = if group.pending_requests.is_empty() {
            String::from("No pending requests.")
        } else {
            group
                .pending_requests
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        };
        CommandOutcome::reply(Reply::success(payload))
    }

    fn accept_request(
        &self,
        caller: Option<&str>,
        group_id: &str,
        user_id: &str,
    ) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in")),
        };
        let mut groups = self.groups.lock().unwrap();
        let group = match groups.get_mut(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if group.owner_id != caller {
            return CommandOutcome::reply(Reply::error("You are not the owner of this group."));
        }
        if !group.pending_requests.contains(user_id) {
            return CommandOutcome::reply(Reply::error("This user has not requested to join."));
        }
        group.pending_requests.remove(user_id);
        group.members.insert(user_id.to_owned());
        LOGGER.info(format!("User {user_id} accepted into {group_id}."));
        CommandOutcome::replicated(
            Reply::success("User added to group."),
            SyncEvent::AcceptRequest {
                group_id: group_id.to_owned(),
                user_id: user_id.to_owned(),
            },
        )
    }

    fn list_groups(&self) -> CommandOutcome {
        let groups = self.groups.lock().unwrap();
        let payload = if groups.is_empty() {
            String::from("No groups available.")
        } else {
            groups.keys().cloned().collect::<Vec<_>>().join(" ")
        };
        CommandOutcome::reply(Reply::success(payload))
    }

    fn list_files(&self, group_id: &str) -> CommandOutcome {
        let groups = self.groups.lock().unwrap();
        let group = match groups.get(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        let payload = if group.files.is_empty() {
            String::from("No files in this group.")
        } else {
            group.files.keys().cloned().collect::<Vec<_>>().join(" ")
        };
        CommandOutcome::reply(Reply::success(payload))
    }

    fn upload_file(
        &self,
        caller: Option<&str>,
        group_id: &str,
        filename: &str,
        file_size: u64,
        file_hash: &str,
        piece_hashes: Vec<String>,
    ) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("You must be logged in to upload.")),
        };
        let endpoint = match self.endpoint_for_user(caller) {
            Some(endpoint) => endpoint,
            None => return CommandOutcome::reply(Reply::error("Could not find your address info.")),
        };

        let mut groups = self.groups.lock().unwrap();
        let group = match groups.get_mut(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if !group.members.contains(caller) {
            return CommandOutcome::reply(Reply::error("You are not a member of this group."));
        }

        // Re-upload replaces the manifest and resets the seeder set to the
        // uploader alone.
        let mut file = FileInfo::new(
            filename.to_owned(),
            file_size,
            file_hash.to_owned(),
            piece_hashes.clone(),
        );
        file.seeders.insert(endpoint.clone());
        group.files.insert(filename.to_owned(), file);

        LOGGER.info(format!(
            "File {filename} uploaded to group {group_id} by {caller}"
        ));
        CommandOutcome::replicated(
            Reply::success("File uploaded successfully."),
            SyncEvent::Upload {
                group_id: group_id.to_owned(),
                filename: filename.to_owned(),
                file_size,
                file_hash: file_hash.to_owned(),
                piece_hashes,
                endpoint,
            },
        )
    }

    fn download_file(&self, caller: Option<&str>, group_id: &str, filename: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in.")),
        };
        let groups = self.groups.lock().unwrap();
        let group = match groups.get(group_id) {
            Some(group) => group,
            None => return CommandOutcome::reply(Reply::error("Group does not exist.")),
        };
        if !group.members.contains(caller) {
            return CommandOutcome::reply(Reply::error("Not a member of this group."));
        }
        let file = match group.files.get(filename) {
            Some(file) => file,
            None => return CommandOutcome::reply(Reply::error("File not found in this group.")),
        };
        if file.seeders.is_empty() {
            return CommandOutcome::reply(Reply::error("No seeders available for this file."));
        }
        CommandOutcome::reply(Reply::success(file.manifest().to_wire()))
    }

    fn stop_share(&self, caller: Option<&str>, group_id: &str, filename: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in.")),
        };
        let endpoint = self.endpoint_for_user(caller).unwrap_or_default();

        let mut groups = self.groups.lock().unwrap();
        let file = groups
            .get_mut(group_id)
            .and_then(|group| group.files.get_mut(filename));
        match file {
            Some(file) => {
                file.seeders.remove(&endpoint);
                LOGGER.info(format!(
                    "User {caller} stopped sharing {filename} in {group_id}."
                ));
                CommandOutcome::replicated(
                    Reply::success("No longer sharing file."),
                    SyncEvent::StopShare {
                        group_id: group_id.to_owned(),
                        filename: filename.to_owned(),
                        endpoint,
                    },
                )
            }
            None => CommandOutcome::reply(Reply::error("File or group not found.")),
        }
    }

    fn i_am_seeder(&self, caller: Option<&str>, group_id: &str, filename: &str) -> CommandOutcome {
        let caller = match caller {
            Some(caller) => caller,
            None => return CommandOutcome::reply(Reply::error("Not logged in.")),
        };
        let endpoint = match self.endpoint_for_user(caller) {
            Some(endpoint) => endpoint,
            None => return CommandOutcome::reply(Reply::error("Could not find your address info.")),
        };

        let mut groups = self.groups.lock().unwrap();
        let file = groups
            .get_mut(group_id)
            .and_then(|group| group.files.get_mut(filename));
        match file {
            Some(file) => {
                file.seeders.insert(endpoint.clone());
                LOGGER.info(format!("User {caller} is now a seeder for {filename}"));
                CommandOutcome::replicated(
                    Reply::success("Seeder registered."),
                    SyncEvent::AddSeeder {
                        group_id: group_id.to_owned(),
                        filename: filename.to_owned(),
                        endpoint,
                    },
                )
            }
            None => CommandOutcome::reply(Reply::error("File or group not found.")),
        }
    }

    /// Remove an endpoint from every file's seeder set.
    fn purge_seeder(&self, endpoint: &str) {
        if endpoint.is_empty() {
            return;
        }
        let mut groups = self.groups.lock().unwrap();
        for group in groups.values_mut() {
            for file in group.files.values_mut() {
                file.seeders.remove(endpoint);
            }
        }
    }

    /// Apply one event from the peer tracker. All applications are
    /// last-writer-wins and idempotent; re-applying an event is a no-op.
    pub fn apply(&self, event: &SyncEvent) {
        match event {
            SyncEvent::CreateUser { user_id, password } => {
                self.users
                    .lock()
                    .unwrap()
                    .insert(user_id.clone(), password.clone());
            }
            SyncEvent::Login { user_id, endpoint } => {
                self.sessions.lock().unwrap().insert(
                    user_id.clone(),
                    Session {
                        endpoint: endpoint.clone(),
                        conn_id: None,
                    },
                );
            }
            SyncEvent::Logout { user_id, endpoint } => {
                self.sessions.lock().unwrap().remove(user_id);
                self.purge_seeder(endpoint);
            }
            SyncEvent::CreateGroup { group_id, owner_id } => {
                self.groups.lock().unwrap().insert(
                    group_id.clone(),
                    Group::new(group_id.clone(), owner_id.clone()),
                );
            }
            SyncEvent::JoinGroup { group_id, user_id } => {
                if let Some(group) = self.groups.lock().unwrap().get_mut(group_id) {
                    group.pending_requests.insert(user_id.clone());
                }
            }
            SyncEvent::LeaveGroup { group_id, user_id } => {
                if let Some(group) = self.groups.lock().unwrap().get_mut(group_id) {
                    group.members.remove(user_id);
                }
            }
            SyncEvent::AcceptRequest { group_id, user_id } => {
                if let Some(group) = self.groups.lock().unwrap().get_mut(group_id) {
                    group.pending_requests.remove(user_id);
                    group.members.insert(user_id.clone());
                }
            }
            SyncEvent::Upload {
                group_id,
                filename,
                file_size,
                file_hash,
                piece_hashes,
                endpoint,
            } => {
                let mut groups = self.groups.lock().unwrap();
                // The peer may know a group this tracker never saw created;
                // materialize it rather than drop the manifest.
                let group = groups
                    .entry(group_id.clone())
                    .or_insert_with(|| Group::new(group_id.clone(), String::new()));
                let mut file = FileInfo::new(
                    filename.clone(),
                    *file_size,
                    file_hash.clone(),
                    piece_hashes.clone(),
                );
                file.seeders.insert(endpoint.clone());
                group.files.insert(filename.clone(), file);
            }
            SyncEvent::StopShare {
                group_id,
                filename,
                endpoint,
            } => {
                if let Some(file) = self
                    .groups
                    .lock()
                    .unwrap()
                    .get_mut(group_id)
                    .and_then(|group| group.files.get_mut(filename))
                {
                    file.seeders.remove(endpoint);
                }
            }
            SyncEvent::AddSeeder {
                group_id,
                filename,
                endpoint,
            } => {
                if let Some(file) = self
                    .groups
                    .lock()
                    .unwrap()
                    .get_mut(group_id)
                    .and_then(|group| group.files.get_mut(filename))
                {
                    file.seeders.insert(endpoint.clone());
                }
            }
        }
    }

    #[cfg(test)]
    pub fn group_snapshot(&self, group_id: &str) -> Option<Group> {
        self.groups.lock().unwrap().get(group_id).cloned()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    const IP_A: &str = "127.0.0.1";
    const IP_B: &str = "127.0.0.2";

    fn upload_cmd() -> Command {
        Command::UploadFile {
            group_id: "g1".into(),
            filename: "sample.bin".into(),
            file_size: 600_000,
            file_hash: "ffff".into(),
            piece_hashes: vec!["aaaa".into(), "bbbb".into()],
        }
    }

    /// create alice (conn 1, 127.0.0.1:7000) owning g1 and bob (conn 2,
    /// 127.0.0.2:7001) as an accepted member.
    fn populated() -> Directory {
        let dir = Directory::new();
        dir.execute(
            1,
            IP_A,
            Command::CreateUser {
                user_id: "alice".into(),
                password: "a".into(),
            },
        );
        dir.execute(
            1,
            IP_A,
            Command::Login {
                user_id: "alice".into(),
                password: "a".into(),
                seeder_port: 7000,
            },
        );
        dir.execute(
            2,
            IP_B,
            Command::CreateUser {
                user_id: "bob".into(),
                password: "b".into(),
            },
        );
        dir.execute(
            2,
            IP_B,
            Command::Login {
                user_id: "bob".into(),
                password: "b".into(),
                seeder_port: 7001,
            },
        );
        dir.execute(1, IP_A, Command::CreateGroup { group_id: "g1".into() });
        dir.execute(2, IP_B, Command::JoinGroup { group_id: "g1".into() });
        dir.execute(
            1,
            IP_A,
            Command::AcceptRequest {
                group_id: "g1".into(),
                user_id: "bob".into(),
            },
        );
        dir
    }

    fn assert_group_invariants(group: &Group) {
        assert!(group.members.contains(&group.owner_id));
        assert!(group.members.is_disjoint(&group.pending_requests));
    }

    #[test]
    fn test_create_user_duplicate_rejected() {
        let dir = Directory::new();
        let cmd = Command::CreateUser {
            user_id: "alice".into(),
            password: "a".into(),
        };
        let first = dir.execute(1, IP_A, cmd.clone());
        assert_eq!(first.reply, Reply::success("User created"));
        assert!(first.event.is_some());

        let second = dir.execute(1, IP_A, cmd);
        assert_eq!(second.reply, Reply::error("User already exists"));
        assert!(second.event.is_none());
    }

    #[test]
    fn test_login_wrong_password() {
        let dir = Directory::new();
        dir.execute(
            1,
            IP_A,
            Command::CreateUser {
                user_id: "alice".into(),
                password: "a".into(),
            },
        );
        let outcome = dir.execute(
            1,
            IP_A,
            Command::Login {
                user_id: "alice".into(),
                password: "wrong".into(),
                seeder_port: 7000,
            },
        );
        assert_eq!(outcome.reply, Reply::error("Invalid credentials"));
        assert!(dir.endpoint_for_user("alice").is_none());
    }

    #[test]
    fn test_relogin_evicts_old_connection() {
        let dir = populated();
        let outcome = dir.execute(
            9,
            IP_B,
            Command::Login {
                user_id: "alice".into(),
                password: "a".into(),
                seeder_port: 7100,
            },
        );
        assert!(outcome.reply.is_success());
        assert_eq!(outcome.evicted_conn, Some(1));
        assert_eq!(dir.endpoint_for_user("alice").unwrap(), "127.0.0.2:7100");
        // old binding is gone, new one holds
        assert!(dir.user_for_conn(1).is_none());
        assert_eq!(dir.user_for_conn(9).unwrap(), "alice");
        // the evicted connection's cleanup must not tear down the session
        assert!(dir.disconnect(1).is_none());
        assert!(dir.endpoint_for_user("alice").is_some());
    }

    #[test]
    fn test_join_accept_flow_keeps_invariants() {
        let dir = populated();
        let group = dir.group_snapshot("g1").unwrap();
        assert_group_invariants(&group);
        assert!(group.members.contains("bob"));
        assert!(!group.pending_requests.contains("bob"));
    }

    #[test]
    fn test_accept_request_not_repeatable() {
        let dir = populated();
        let outcome = dir.execute(
            1,
            IP_A,
            Command::AcceptRequest {
                group_id: "g1".into(),
                user_id: "bob".into(),
            },
        );
        assert_eq!(
            outcome.reply,
            Reply::error("This user has not requested to join.")
        );
    }

    #[test]
    fn test_join_while_member_rejected() {
        let dir = populated();
        let outcome = dir.execute(2, IP_B, Command::JoinGroup { group_id: "g1".into() });
        assert_eq!(outcome.reply, Reply::error("You are already a member."));
        assert_group_invariants(&dir.group_snapshot("g1").unwrap());
    }

    #[test]
    fn test_owner_cannot_leave() {
        let dir = populated();
        let outcome = dir.execute(1, IP_A, Command::LeaveGroup { group_id: "g1".into() });
        assert_eq!(outcome.reply, Reply::error("Owner cannot leave the group."));
        let group = dir.group_snapshot("g1").unwrap();
        assert!(group.members.contains("alice"));
    }

    #[test]
    fn test_member_can_leave() {
        let dir = populated();
        let outcome = dir.execute(2, IP_B, Command::LeaveGroup { group_id: "g1".into() });
        assert_eq!(outcome.reply, Reply::success("You have left the group."));
        assert!(!dir.group_snapshot("g1").unwrap().members.contains("bob"));
    }

    #[test]
    fn test_list_requests_owner_only() {
        let dir = populated();
        let outcome = dir.execute(
            2,
            IP_B,
            Command::ListRequests {
                group_id: "g1".into(),
            },
        );
        assert_eq!(
            outcome.reply,
            Reply::error("You are not the owner of this group.")
        );
        let outcome = dir.execute(
            1,
            IP_A,
            Command::ListRequests {
                group_id: "g1".into(),
            },
        );
        assert_eq!(outcome.reply, Reply::success("No pending requests."));
    }

    #[test]
    fn test_upload_registers_uploader_as_seeder() {
        let dir = populated();
        let outcome = dir.execute(1, IP_A, upload_cmd());
        assert_eq!(outcome.reply, Reply::success("File uploaded successfully."));
        let group = dir.group_snapshot("g1").unwrap();
        let file = group.files.get("sample.bin").unwrap();
        assert!(file.seeders.contains("127.0.0.1:7000"));
        assert_eq!(file.piece_hashes.len(), 2);
    }

    #[test]
    fn test_reupload_resets_seeders() {
        let dir = populated();
        dir.execute(1, IP_A, upload_cmd());
        dir.execute(
            2,
            IP_B,
            Command::IAmSeeder {
                group_id: "g1".into(),
                filename: "sample.bin".into(),
            },
        );
        assert_eq!(
            dir.group_snapshot("g1")
                .unwrap()
                .files["sample.bin"]
                .seeders
                .len(),
            2
        );

        dir.execute(1, IP_A, upload_cmd());
        let group = dir.group_snapshot("g1").unwrap();
        let seeders = &group.files["sample.bin"].seeders;
        assert_eq!(seeders.len(), 1);
        assert!(seeders.contains("127.0.0.1:7000"));
    }

    #[test]
    fn test_upload_requires_membership() {
        let dir = populated();
        dir.execute(2, IP_B, Command::LeaveGroup { group_id: "g1".into() });
        let outcome = dir.execute(
            2,
            IP_B,
            Command::UploadFile {
                group_id: "g1".into(),
                filename: "other.bin".into(),
                file_size: 1,
                file_hash: "ffff".into(),
                piece_hashes: vec!["aaaa".into()],
            },
        );
        assert_eq!(
            outcome.reply,
            Reply::error("You are not a member of this group.")
        );
    }

    #[test]
    fn test_download_manifest_payload() {
        let dir = populated();
        dir.execute(1, IP_A, upload_cmd());
        let outcome = dir.execute(
            2,
            IP_B,
            Command::DownloadFile {
                group_id: "g1".into(),
                filename: "sample.bin".into(),
            },
        );
        assert_eq!(
            outcome.reply,
            Reply::success("600000 ffff aaaa bbbb 127.0.0.1:7000")
        );
    }

    #[test]
    fn test_download_without_seeders() {
        let dir = populated();
        dir.execute(1, IP_A, upload_cmd());
        dir.execute(
            1,
            IP_A,
            Command::StopShare {
                group_id: "g1".into(),
                filename: "sample.bin".into(),
            },
        );
        let outcome = dir.execute(
            2,
            IP_B,
            Command::DownloadFile {
                group_id: "g1".into(),
                filename: "sample.bin".into(),
            },
        );
        assert_eq!(
            outcome.reply,
            Reply::error("No seeders available for this file.")
        );
    }

    #[test]
    fn test_download_missing_file() {
        let dir = populated();
        let outcome = dir.execute(
            2,
            IP_B,
            Command::DownloadFile {
                group_id: "g1".into(),
                filename: "nope.bin".into(),
            },
        );
        assert_eq!(outcome.reply, Reply::error("File not found in this group."));
    }

    #[test]
    fn test_logout_purges_every_seeder_set() {
        let dir = populated();
        dir.execute(1, IP_A, upload_cmd());
        dir.execute(1, IP_A, Command::CreateGroup { group_id: "g2".into() });
        dir.execute(
            1,
            IP_A,
            Command::UploadFile {
                group_id: "g2".into(),
                filename: "second.bin".into(),
                file_size: 1,
                file_hash: "eeee".into(),
                piece_hashes: vec!["cccc".into()],
            },
        );

        let outcome = dir.execute(1, IP_A, Command::Logout { user_id: None });
        assert_eq!(outcome.reply, Reply::success("Logout successful"));

        for group_id in ["g1", "g2"] {
            let group = dir.group_snapshot(group_id).unwrap();
            for file in group.files.values() {
                assert!(
                    !file.seeders.contains("127.0.0.1:7000"),
                    "stale endpoint left in {}/{}",
                    group_id,
                    file.filename
                );
            }
        }
        assert!(dir.endpoint_for_user("alice").is_none());
    }

    #[test]
    fn test_i_am_seeder_adds_endpoint() {
        let dir = populated();
        dir.execute(1, IP_A, upload_cmd());
        let outcome = dir.execute(
            2,
            IP_B,
            Command::IAmSeeder {
                group_id: "g1".into(),
                filename: "sample.bin".into(),
            },
        );
        assert_eq!(outcome.reply, Reply::success("Seeder registered."));
        let group = dir.group_snapshot("g1").unwrap();
        assert!(group.files["sample.bin"].seeders.contains("127.0.0.2:7001"));
    }

    #[test]
    fn test_commands_require_login() {
        let dir = Directory::new();
        let outcome = dir.execute(7, IP_A, Command::CreateGroup { group_id: "g1".into() });
        assert_eq!(outcome.reply, Reply::error("Not logged in"));
    }

    #[test]
    fn test_apply_create_user_idempotent() {
        let dir = Directory::new();
        let event = SyncEvent::CreateUser {
            user_id: "alice".into(),
            password: "a".into(),
        };
        dir.apply(&event);
        dir.apply(&event);
        assert_eq!(dir.users.lock().unwrap().len(), 1);
        assert_eq!(dir.users.lock().unwrap()["alice"], "a");
    }

    #[test]
    fn test_apply_accept_request_idempotent() {
        let dir = Directory::new();
        dir.apply(&SyncEvent::CreateGroup {
            group_id: "g1".into(),
            owner_id: "alice".into(),
        });
        dir.apply(&SyncEvent::JoinGroup {
            group_id: "g1".into(),
            user_id: "bob".into(),
        });
        let accept = SyncEvent::AcceptRequest {
            group_id: "g1".into(),
            user_id: "bob".into(),
        };
        dir.apply(&accept);
        let first = dir.group_snapshot("g1").unwrap();
        dir.apply(&accept);
        let second = dir.group_snapshot("g1").unwrap();
        assert_eq!(first.members, second.members);
        assert_eq!(first.pending_requests, second.pending_requests);
        assert_group_invariants(&second);
    }

    #[test]
    fn test_apply_upload_idempotent_and_seeded() {
        let dir = Directory::new();
        let event = SyncEvent::Upload {
            group_id: "g1".into(),
            filename: "sample.bin".into(),
            file_size: 600_000,
            file_hash: "ffff".into(),
            piece_hashes: vec!["aaaa".into(), "bbbb".into()],
            endpoint: "127.0.0.1:7000".into(),
        };
        dir.apply(&event);
        dir.apply(&event);
        let group = dir.group_snapshot("g1").unwrap();
        let file = &group.files["sample.bin"];
        assert_eq!(file.file_size, 600_000);
        assert_eq!(file.seeders.len(), 1);
        assert!(file.seeders.contains("127.0.0.1:7000"));
    }

    #[test]
    fn test_apply_logout_purges_and_drops_session() {
        let dir = Directory::new();
        dir.apply(&SyncEvent::Login {
            user_id: "alice".into(),
            endpoint: "127.0.0.1:7000".into(),
        });
        dir.apply(&SyncEvent::Upload {
            group_id: "g1".into(),
            filename: "sample.bin".into(),
            file_size: 1,
            file_hash: "ffff".into(),
            piece_hashes: vec!["aaaa".into()],
            endpoint: "127.0.0.1:7000".into(),
        });
        let event = SyncEvent::Logout {
            user_id: "alice".into(),
            endpoint: "127.0.0.1:7000".into(),
        };
        dir.apply(&event);
        dir.apply(&event);
        assert!(dir.endpoint_for_user("alice").is_none());
        let group = dir.group_snapshot("g1").unwrap();
        assert!(group.files["sample.bin"].seeders.is_empty());
    }
}
