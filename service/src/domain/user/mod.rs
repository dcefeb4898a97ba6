//! [`User`] definitions.

pub mod session;

use std::sync::LazyLock;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use self::session::Session;

/// Registered marketplace user.
#[derive(Clone, Debug, From)]
pub struct User {
    /// ID of this [`User`]
    pub id: Id,

    /// Display [`Name`] of this [`User`].
    pub name: Name,

    /// [`Email`] of this [`User`].
    ///
    /// Unique across all registered [`User`]s (case-insensitively).
    pub email: Email,

    /// [`Phone`] of this [`User`].
    pub phone: Phone,

    /// [`PasswordHash`] of this [`User`].
    pub password_hash: PasswordHash,

    /// [`Status`] of this [`User`].
    pub status: Status,

    /// [`AvatarUrl`] of this [`User`], if any.
    pub avatar_url: Option<AvatarUrl>,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`User`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Display name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    ///
    /// Any non-empty string fits, bounded by the column width.
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        !name.is_empty() && name.len() <= 512
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Email address of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `address` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Creates a new [`Email`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression checking the `local@domain` [`Email`] shape.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
        });

        REGEX.is_match(address.as_ref())
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Phone number of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Phone(String);

impl Phone {
    /// Creates a new [`Phone`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `number` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Creates a new [`Phone`] if the given `number` is valid.
    #[must_use]
    pub fn new(number: impl Into<String>) -> Option<Self> {
        let number = number.into();
        Self::check(&number).then_some(Self(number))
    }

    /// Checks whether the given `number` is a valid [`Phone`].
    ///
    /// Any non-empty string fits, bounded by the column width: phone
    /// numbers are display-only, so no format is imposed on them.
    fn check(number: impl AsRef<str>) -> bool {
        let number = number.as_ref();
        !number.is_empty() && number.len() <= 32
    }
}

impl FromStr for Phone {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Phone`")
    }
}

/// Password of a [`User`].
#[derive(Clone, Debug, Display, Eq, From, PartialEq)]
#[from(&str, String)]
pub struct Password(String);

impl Password {
    /// Creates a new [`Password`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `password` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is a valid [`Password`].
    ///
    /// Any non-empty string fits, capped at 128 bytes.
    fn check(password: impl AsRef<str>) -> bool {
        let password = password.as_ref();
        !password.is_empty() && password.len() <= 128
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Salted one-way [bcrypt] hash of a [`User`]'s [`Password`].
///
/// Hashing the same [`Password`] twice yields two different opaque
/// outputs (the salt is randomized internally), so the only meaningful
/// operation on a [`PasswordHash`] is [`PasswordHash::verify()`].
///
/// [bcrypt]: https://wikipedia.org/wiki/Bcrypt
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Creates a new [`PasswordHash`] from its stored representation.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `hash` is a well-formed
    /// [bcrypt] hash.
    ///
    /// [bcrypt]: https://wikipedia.org/wiki/Bcrypt
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// Creates a new [`PasswordHash`] of the given [`Password`] with the
    /// provided [bcrypt] `cost` factor.
    ///
    /// # Errors
    ///
    /// If the hashing itself fails (notably, on an out-of-range `cost`).
    ///
    /// [bcrypt]: https://wikipedia.org/wiki/Bcrypt
    pub fn new(
        password: &Password,
        cost: u32,
    ) -> Result<Self, bcrypt::BcryptError> {
        bcrypt::hash(&password.0, cost).map(Self)
    }

    /// Verifies whether the given [`Password`] matches this [`PasswordHash`].
    ///
    /// A merely-wrong [`Password`] is `Ok(false)`, never an error.
    ///
    /// # Errors
    ///
    /// With an [`IntegrityError`], if this [`PasswordHash`] itself is
    /// malformed (stored hash corruption).
    pub fn verify(&self, password: &Password) -> Result<bool, IntegrityError> {
        bcrypt::verify(&password.0, &self.0).map_err(|_| IntegrityError)
    }
}

/// Error of a stored [`PasswordHash`] being malformed.
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("Stored `PasswordHash` is malformed")]
pub struct IntegrityError;

define_kind! {
    #[doc = "Status of a [`User`] account."]
    enum Status {
        #[doc = "Account is active and may log in."]
        Active = 1,

        #[doc = "Account is disabled by an administrative action."]
        Disabled = 2,
    }
}

/// URL of a [`User`]'s avatar image.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct AvatarUrl(String);

impl AvatarUrl {
    /// Creates a new [`AvatarUrl`] if the given `url` is valid.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        Self::check(&url).then_some(Self(url))
    }

    /// Checks whether the given `url` is a valid [`AvatarUrl`].
    fn check(url: impl AsRef<str>) -> bool {
        let url = url.as_ref();
        !url.is_empty() && url.len() <= 2048 && !url.contains(char::is_whitespace)
    }
}

impl FromStr for AvatarUrl {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `AvatarUrl`")
    }
}

/// [`DateTime`] when a [`User`] was created.
pub type CreationDateTime = DateTimeOf<(User, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::{
        Email, IntegrityError, Name, Password, PasswordHash, Phone, Status,
    };

    fn password(s: &str) -> Password {
        Password::new(s).unwrap()
    }

    #[test]
    fn email_accepts_local_at_domain() {
        for valid in ["ana@x.com", "a.b+c@mail.example.org", "x@y.co"] {
            assert!(Email::new(valid).is_some(), "rejected `{valid}`");
        }
        for invalid in ["", "ana", "ana@", "@x.com", "ana@x", "a b@x.com"] {
            assert!(Email::new(invalid).is_none(), "accepted `{invalid}`");
        }
    }

    #[test]
    fn phone_accepts_any_nonempty_number() {
        for valid in ["5550000", "casa-555", "+1 555 000 0123"] {
            assert!(Phone::new(valid).is_some(), "rejected `{valid}`");
        }
        assert!(Phone::new("").is_none());
        assert!(Phone::new("5".repeat(33)).is_none());
    }

    #[test]
    fn single_character_password_is_accepted() {
        assert!(Password::new("a").is_some());
        assert!(Password::new("").is_none());
    }

    #[test]
    fn name_keeps_surrounding_whitespace() {
        assert!(Name::new("Ana ").is_some());
        assert!(Name::new("").is_none());
    }

    #[test]
    fn status_round_trips_through_its_string_form() {
        assert_eq!(Status::Active.to_string(), "ACTIVE");
        assert_eq!("DISABLED".parse::<Status>().unwrap(), Status::Disabled);
    }

    #[test]
    fn hash_verifies_original_password_only() {
        let hash = PasswordHash::new(&password("secret1"), 4).unwrap();

        assert!(hash.verify(&password("secret1")).unwrap());
        assert!(!hash.verify(&password("secret2")).unwrap());
    }

    #[test]
    fn hash_is_salted() {
        let p = password("secret1");
        let first = PasswordHash::new(&p, 4).unwrap();
        let second = PasswordHash::new(&p, 4).unwrap();

        assert_ne!(first, second);
        assert!(first.verify(&p).unwrap());
        assert!(second.verify(&p).unwrap());
    }

    #[test]
    fn malformed_hash_is_integrity_error() {
        let corrupted = PasswordHash("not-a-bcrypt-hash".into());

        assert!(matches!(
            corrupted.verify(&password("secret1")),
            Err(IntegrityError),
        ));
    }
}
