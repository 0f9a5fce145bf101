use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::auth::{IdentityGateway, Profile, Role, Session, User, VerificationHandle};
use crate::error::{auth_error, Error};

struct Account {
    user: User,
    secret: String,
}

struct PendingVerification {
    phone: String,
    code: String,
}

/// In-process stand-in for a hosted identity provider. Accounts, role
/// claims and one-time codes live in its own directory, so the rest of
/// the system only ever sees sessions it issued.
pub struct LocalIdentity {
    directory: Mutex<HashMap<String, Account>>,
    verifications: Mutex<HashMap<Uuid, PendingVerification>>,
    session: watch::Sender<Option<Session>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        let (session, _) = watch::channel(None);

        Self {
            directory: Mutex::new(HashMap::new()),
            verifications: Mutex::new(HashMap::new()),
            session,
        }
    }

    /// Peeks at the code a real provider would have sent over SMS.
    pub async fn verification_code(&self, handle: &VerificationHandle) -> Option<String> {
        self.verifications
            .lock()
            .await
            .get(&handle.token)
            .map(|pending| pending.code.clone())
    }
}

#[async_trait]
impl IdentityGateway for LocalIdentity {
    #[tracing::instrument(skip(self, secret))]
    async fn sign_in_with_password(
        &self,
        identifier: String,
        secret: String,
    ) -> Result<Session, Error> {
        let directory = self.directory.lock().await;

        let account = directory
            .get(&identifier)
            .ok_or_else(|| auth_error("no account with this identifier"))?;

        if account.secret != secret {
            return Err(auth_error("incorrect secret"));
        }

        let session = Session::new(account.user.clone());
        self.session.send_replace(Some(session.clone()));

        Ok(session)
    }

    #[tracing::instrument(skip(self, secret))]
    async fn sign_up_with_password(
        &self,
        identifier: String,
        secret: String,
        profile: Profile,
    ) -> Result<Session, Error> {
        if identifier.trim().is_empty() || secret.len() < 6 {
            return Err(auth_error(
                "an identifier and a secret of at least 6 characters are required",
            ));
        }

        let mut directory = self.directory.lock().await;

        if directory.contains_key(&identifier) {
            return Err(auth_error("an account with this identifier already exists"));
        }

        let user = User::new(
            &profile.name,
            Some(identifier.clone()),
            profile.phone.clone(),
            profile.role,
        );

        directory.insert(
            identifier,
            Account {
                user: user.clone(),
                secret,
            },
        );

        let session = Session::new(user);
        self.session.send_replace(Some(session.clone()));

        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    async fn start_phone_verification(
        &self,
        phone_number: String,
    ) -> Result<VerificationHandle, Error> {
        if phone_number.trim().is_empty() {
            return Err(auth_error("a phone number is required"));
        }

        {
            let directory = self.directory.lock().await;

            let existing = directory
                .values()
                .find(|account| account.user.phone.as_deref() == Some(phone_number.as_str()));

            if let Some(account) = existing {
                if !account.user.is_passenger() {
                    return Err(auth_error("phone sign-in is only available to passengers"));
                }
            }
        }

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));

        tracing::info!("sending verification code to {:?}...", phone_number);

        let handle = VerificationHandle {
            token: Uuid::new_v4(),
            phone: phone_number.clone(),
        };

        self.verifications.lock().await.insert(
            handle.token,
            PendingVerification {
                phone: phone_number,
                code,
            },
        );

        Ok(handle)
    }

    /// A wrong code voids the pending verification, so another attempt
    /// has to start over with a fresh code.
    #[tracing::instrument(skip(self, code))]
    async fn confirm_phone_verification(
        &self,
        handle: VerificationHandle,
        code: String,
    ) -> Result<Session, Error> {
        let pending = self
            .verifications
            .lock()
            .await
            .remove(&handle.token)
            .ok_or_else(|| auth_error("verification expired or was never started"))?;

        if pending.code != code {
            return Err(auth_error("incorrect verification code"));
        }

        let mut directory = self.directory.lock().await;

        let existing = directory
            .values()
            .find(|account| account.user.phone.as_deref() == Some(pending.phone.as_str()))
            .map(|account| account.user.clone());

        let user = match existing {
            Some(user) => user,
            None => {
                // first phone sign-in provisions a passenger account
                let user = User::new("New User", None, Some(pending.phone.clone()), Role::Passenger);

                directory.insert(
                    format!("phone:{}", pending.phone),
                    Account {
                        user: user.clone(),
                        secret: "".into(),
                    },
                );

                user
            }
        };

        let session = Session::new(user);
        self.session.send_replace(Some(session.clone()));

        Ok(session)
    }

    fn current_session(&self) -> Option<Session> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    #[tracing::instrument(skip(self))]
    async fn end_session(&self) {
        self.session.send_replace(None);
    }
}

#[test]
fn password_accounts_round_trip() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();

        let profile = Profile {
            name: "Priya Raman".into(),
            phone: Some("+91 98400 11223".into()),
            role: Role::Passenger,
        };

        let session = identity
            .sign_up_with_password("priya@example.com".into(), "secret123".into(), profile)
            .await
            .unwrap();
        assert!(session.user.is_passenger());

        identity.end_session().await;
        assert!(identity.current_session().is_none());

        let session = identity
            .sign_in_with_password("priya@example.com".into(), "secret123".into())
            .await
            .unwrap();
        assert_eq!(session.user.name, "Priya Raman");
        assert!(identity.current_session().is_some());

        let err = identity
            .sign_in_with_password("priya@example.com".into(), "wrong".into())
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);
    });
}

#[test]
fn duplicate_sign_up_is_rejected() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();

        let profile = Profile {
            name: "Priya Raman".into(),
            phone: None,
            role: Role::Passenger,
        };

        identity
            .sign_up_with_password("priya@example.com".into(), "secret123".into(), profile.clone())
            .await
            .unwrap();

        let err = identity
            .sign_up_with_password("priya@example.com".into(), "secret456".into(), profile)
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);
    });
}

#[test]
fn phone_verification_provisions_a_passenger_once() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();

        let handle = identity
            .start_phone_verification("+91 98400 11223".into())
            .await
            .unwrap();
        let code = identity.verification_code(&handle).await.unwrap();

        let session = identity
            .confirm_phone_verification(handle, code)
            .await
            .unwrap();
        assert_eq!(session.user.name, "New User");
        assert!(session.user.is_passenger());

        let first_id = session.user.id;

        let handle = identity
            .start_phone_verification("+91 98400 11223".into())
            .await
            .unwrap();
        let code = identity.verification_code(&handle).await.unwrap();

        let session = identity
            .confirm_phone_verification(handle, code)
            .await
            .unwrap();
        assert_eq!(session.user.id, first_id);
    });
}

#[test]
fn wrong_code_voids_the_verification() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();

        let handle = identity
            .start_phone_verification("+91 98400 11223".into())
            .await
            .unwrap();
        let code = identity.verification_code(&handle).await.unwrap();

        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = identity
            .confirm_phone_verification(handle.clone(), wrong.into())
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);

        let err = identity
            .confirm_phone_verification(handle, code)
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);
    });
}

#[test]
fn phone_sign_in_is_passenger_only() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();

        let profile = Profile {
            name: "Suresh Babu".into(),
            phone: Some("+91 98431 22870".into()),
            role: Role::Driver,
        };

        let session = identity
            .sign_up_with_password("suresh@example.com".into(), "secret123".into(), profile)
            .await
            .unwrap();
        assert!(session.user.is_driver());

        let err = identity
            .start_phone_verification("+91 98431 22870".into())
            .await
            .unwrap_err();
        assert_eq!(err.code, 103);
    });
}

#[test]
fn session_stream_notifies_subscribers() {
    use tokio_test::block_on;

    block_on(async {
        let identity = LocalIdentity::new();
        let mut sessions = identity.subscribe();

        let profile = Profile {
            name: "Priya Raman".into(),
            phone: None,
            role: Role::Passenger,
        };

        identity
            .sign_up_with_password("priya@example.com".into(), "secret123".into(), profile)
            .await
            .unwrap();

        sessions.changed().await.unwrap();
        assert!(sessions.borrow().is_some());

        identity.end_session().await;

        sessions.changed().await.unwrap();
        assert!(sessions.borrow().is_none());
    });
}
