use serde::{Deserialize, Serialize};

/// A row of the `mentor` table.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct Mentor {
    pub id: i64,
    pub uid: Option<String>,
    pub firebase_uid: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub nama_lengkap: Option<String>,
    pub nik: Option<String>,
    pub keahlian: Option<String>,
    pub keahlian_utama: Option<String>,
    pub keahlian_lain: Option<String>,
    pub kelamin: Option<String>,
    pub linkedin: Option<String>,
    pub deskripsi: Option<String>,
    pub status_verifikasi: Option<String>,
    pub status: Option<String>,
    pub verified: Option<i64>,
    pub created_at: Option<String>,
}

fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Mentor {
    /// Login reads the first verification column that is set.
    pub fn verified_by_precedence(&self) -> bool {
        if let Some(s) = &self.status_verifikasi {
            return s == "verified";
        }
        if let Some(s) = &self.status {
            return s == "verified";
        }
        self.verified == Some(1)
    }

    /// The status check accepts any verification column.
    pub fn verified_by_any(&self) -> bool {
        self.status_verifikasi.as_deref() == Some("verified")
            || self.status.as_deref() == Some("verified")
            || self.verified == Some(1)
    }

    fn external_uid(&self) -> Option<String> {
        self.uid.clone().or_else(|| self.firebase_uid.clone())
    }

    pub fn login_data(&self, verified: bool) -> LoginMentorData {
        LoginMentorData {
            id: Some(self.id),
            uid: self.external_uid(),
            email: self.email.clone().unwrap_or_default(),
            nama_lengkap: self.nama_lengkap.clone().unwrap_or_default(),
            nik: self.nik.clone().unwrap_or_default(),
            keahlian: self.keahlian.clone().unwrap_or_default(),
            keahlian_utama: self.keahlian_utama.clone().or_else(|| self.keahlian.clone()).unwrap_or_default(),
            keahlian_lain: self.keahlian_lain.clone().unwrap_or_default(),
            kelamin: self.kelamin.clone().unwrap_or_default(),
            linkedin: self.linkedin.clone().unwrap_or_default(),
            deskripsi: self.deskripsi.clone().unwrap_or_default(),
            status_verifikasi: self
                .status_verifikasi
                .clone()
                .unwrap_or_else(|| if verified { "verified" } else { "pending" }.to_string()),
            created_at: self.created_at.clone().unwrap_or_else(now_timestamp),
        }
    }

    /// `requested_uid` is echoed back when the row has neither uid column set.
    pub fn status_data(&self, requested_uid: &str) -> StatusMentorData {
        StatusMentorData {
            uid: self.external_uid().unwrap_or_else(|| requested_uid.to_string()),
            email: self.email.clone().unwrap_or_default(),
            nama_lengkap: self.nama_lengkap.clone().unwrap_or_default(),
            nik: self.nik.clone().unwrap_or_default(),
            keahlian: self.keahlian.clone().unwrap_or_default(),
            keahlian_lain: self.keahlian_lain.clone().unwrap_or_default(),
            kelamin: self.kelamin.clone().unwrap_or_default(),
            linkedin: self.linkedin.clone().unwrap_or_default(),
            status_verifikasi: self.status_verifikasi.clone().unwrap_or_else(|| "pending".to_string()),
            created_at: self.created_at.clone().unwrap_or_else(now_timestamp),
        }
    }
}

/// Insert payload for the `mentor` table.
#[derive(Debug, Clone, Default)]
pub struct NewMentor {
    pub uid: Option<String>,
    pub firebase_uid: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub nama_lengkap: Option<String>,
    pub nik: Option<String>,
    pub keahlian: Option<String>,
    pub keahlian_utama: Option<String>,
    pub keahlian_lain: Option<String>,
    pub kelamin: Option<String>,
    pub linkedin: Option<String>,
    pub deskripsi: Option<String>,
    pub status_verifikasi: Option<String>,
    pub status: Option<String>,
    pub verified: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusForm {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginMentorData {
    pub id: Option<i64>,
    pub uid: Option<String>,
    pub email: String,
    pub nama_lengkap: String,
    pub nik: String,
    pub keahlian: String,
    pub keahlian_utama: String,
    pub keahlian_lain: String,
    pub kelamin: String,
    pub linkedin: String,
    pub deskripsi: String,
    pub status_verifikasi: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMentorData {
    pub uid: String,
    pub email: String,
    pub nama_lengkap: String,
    pub nik: String,
    pub keahlian: String,
    pub keahlian_lain: String,
    pub kelamin: String,
    pub linkedin: String,
    pub status_verifikasi: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub status: String,
    pub message: String,
    pub verified: bool,
    pub mentor_data: LoginMentorData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub verified: bool,
    pub mentor_data: StatusMentorData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}
