pub mod cleanup;
pub mod codes;
pub mod mailer;
pub mod ordering;
pub mod otp;
pub mod seating;
