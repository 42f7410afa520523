//! Texts and button layouts shown to participants.

use super::model::FormData;

pub const WELCOME: &str = "This bot collects a short questionnaire\n\n\
To start filling out the form - send the /fillform command";

pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel. You are not filling out a form\n\n\
To start filling out the form - send the /fillform command";

pub const CANCELLED: &str = "You have stopped filling out the form\n\n\
To start filling out the form again - send the /fillform command";

pub const NOT_FILLED: &str =
    "You have not filled out the questionnaire yet. To start, send the command /fillform";

pub const ECHO_FALLBACK: &str = "Sorry, I don't understand you";

pub const SAVED: &str = "Thank you! Your data has been saved!\n\nThe form is complete";

pub const SHOW_DATA_HINT: &str = "To view the data of your questionnaire - send the command /showdata";

/// Shown if a finished session turns out to be incomplete. Should not occur.
pub const LOST_ANSWERS: &str = "Something went wrong and your answers were lost\n\n\
To start again - send the /fillform command";

pub const NAME_PROMPT: &str = "Please enter your name";
pub const AGE_PROMPT: &str = "Thank you!\n\nNow enter your age";
pub const GENDER_PROMPT: &str = "Thank you!\n\nPlease specify your gender";
pub const PHOTO_PROMPT: &str = "Thank you! Now please upload your photo";
pub const EDUCATION_PROMPT: &str = "Thank you!\n\nPlease specify your education";
pub const WANTS_NEWS_PROMPT: &str = "Thank you!\n\nWould you like to receive news?";

pub const NAME_ERROR: &str = "What you sent does not look like a name\n\n\
Please enter your name\n\n\
If you want to cancel filling out the form - send the /cancel command";
pub const AGE_ERROR: &str = "Age must be an integer between 4 and 120\n\n\
Try again\n\n\
If you want to cancel filling out the form - send the /cancel command";
pub const GENDER_ERROR: &str = "Please use the buttons when selecting gender\n\n\
If you want to cancel filling out the form - send the /cancel command";
pub const PHOTO_ERROR: &str = "Please send your photo at this step\n\n\
If you want to cancel filling out the form - send the /cancel command";
pub const EDUCATION_ERROR: &str = "Please use the buttons when selecting education\n\n\
If you want to cancel filling out the form - send the /cancel command";
pub const WANTS_NEWS_ERROR: &str = "Please use the buttons when deciding to receive news\n\n\
If you want to cancel filling out the form - send the /cancel command";

/// Gender buttons: two in the first row, one in the second.
pub const GENDER_CHOICES: &[&[(&str, &str)]] = &[
    &[("Male ♂", "male"), ("Female ♀", "female")],
    &[("🤷 Not sure yet", "undefined_gender")],
];

/// Education buttons: two in the first row, one in the second.
pub const EDUCATION_CHOICES: &[&[(&str, &str)]] = &[
    &[("Secondary", "secondary"), ("Higher", "higher")],
    &[("🤷 None", "no_edu")],
];

/// News buttons, one row.
pub const WANTS_NEWS_CHOICES: &[&[(&str, &str)]] = &[&[("Yes", "yes_news"), ("No, thanks", "no_news")]];

/// Caption shown under the photo when a participant asks for their record.
pub fn record_caption(data: &FormData) -> String {
    format!(
        "Name: {}\nAge: {}\nGender: {}\nEducation: {}\nReceive news: {}",
        data.name,
        data.age,
        data.gender,
        data.education,
        if data.wants_news { "yes" } else { "no" }
    )
}
