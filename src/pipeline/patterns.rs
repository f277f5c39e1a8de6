//! Curated phrase pools for classification.
//!
//! Multi-word constructions are preferred over single generic words to keep
//! false positives down. Entries are written for readability; both stages
//! normalize them with [`crate::text::normalize`] before matching, so case,
//! quotes, and punctuation here do not matter.

/// Advance / approve signals.
pub const POSITIVE_PHRASES: &[&str] = &[
    // EN
    "we would like to proceed",
    "we'd like to proceed",
    "move forward with your application",
    "we will move forward with your application",
    "move you to the next round",
    "proceed to the interview stage",
    "advance to the next step",
    "advance your application",
    "progress your application",
    "we are pleased to inform you",
    "we're pleased to inform you",
    "pleased to inform you",
    "successful application",
    "invite you to interview",
    "invite you to the next stage",
    "schedule an interview",
    "we would like to schedule an interview",
    "shortlisted",
    "approve",
    "approved",
    "we were impressed with your background",
    "we're impressed with your background",
    // RU
    "пригласить на интервью",
    "приглашаем на собеседование",
    "двигаться дальше с вашей заявкой",
    "двигаемся дальше",
    "прошли на следующий этап",
    "успешно прошли отбор",
    // UA
    "запросити на співбесіду",
    "запрошуємо на співбесіду",
    "рухатись далі із заявкою",
    "рухаємось далі",
    "пройшли на наступний етап",
    "успішно пройшли відбір",
];

/// Decline / stop signals.
pub const NEGATIVE_PHRASES: &[&str] = &[
    // EN
    "we decided to move forward with another candidate",
    "we regret to inform you",
    "we are sorry to inform you",
    "we're sorry to inform you",
    "we will not be moving forward",
    "we will not move forward",
    "not moving forward with your application",
    "decided not to proceed",
    "unable to move forward",
    "not to move forward",
    "with other candidate",
    "no longer under consideration",
    "not selected for this position",
    "position has been filled",
    "application was unsuccessful",
    "your application was unsuccessful",
    "will not be proceeding",
    "better fit for other candidates",
    "declined",
    "decline",
    // single-word catch for a very strong signal
    "unfortunately",
    // RU
    "к сожалению",
    "вынуждены отказать",
    "вынуждены отказать вам",
    "решили не продолжать",
    "не можем продолжить процесс",
    "не можем продолжить рассмотрение",
    "позиция закрыта",
    "ваша заявка отклонена",
    "заявка была отклонена",
    "не прошли на следующий этап",
    // UA
    "на жаль",
    "вимушені відмовити",
    "вирішили не продовжувати",
    "не можемо продовжити процес",
    "позицію закрито",
    "вашу заявку відхилено",
    "заявка була відхилена",
    "не пройшли на наступний етап",
];

/// Noise markers: job aggregators, digests, newsletters, OTP / 2FA notices.
pub const NOISE_MARKERS: &[&str] = &[
    // EN digests and alerts
    "job alert",
    "job alerts",
    "new jobs",
    "jobs you may be interested in",
    "similar jobs",
    "recommended jobs",
    "hottest jobs",
    "linkedin jobs",
    "indeed jobs",
    "glassdoor jobs",
    "weekly digest",
    "daily digest",
    "job digest",
    "newsletter",
    "roundup",
    "career recommendations",
    "job recommendations",
    "under review",
    "if your application",
    "due to high number",
    // aggregator brands
    "linkedin",
    "indeed",
    "glassdoor",
    "ziprecruiter",
    "workable",
    "smartrecruiters",
    // EN OTP / 2FA
    "otp",
    "one time password",
    "one-time password",
    "verification code",
    "two factor authentication",
    "2fa",
    "login code",
    "security code",
    "use this code",
    "your code is",
    "confirm your login",
    "sign in code",
    "pass code",
    "code will expire",
    "confirm your identity",
    // RU / UA digests
    "новые вакансии",
    "подборка вакансий",
    "рассылка вакансий",
    "підбірка вакансій",
    "розсилка вакансій",
    // RU / UA OTP / 2FA
    "одноразовый пароль",
    "код подтверждения",
    "код для входа",
    "двухфакторная аутентификация",
    "перевірочний код",
    "код підтвердження",
    "код входу",
    "одноразовий пароль",
];

/// Owned copies of the default lists, for configuration structs.
pub fn default_positive() -> Vec<String> {
    POSITIVE_PHRASES.iter().map(|s| s.to_string()).collect()
}

pub fn default_negative() -> Vec<String> {
    NEGATIVE_PHRASES.iter().map(|s| s.to_string()).collect()
}

pub fn default_noise() -> Vec<String> {
    NOISE_MARKERS.iter().map(|s| s.to_string()).collect()
}
