use rand::seq::SliceRandom;

// Palette the UI uses to tell diners at one table apart
const USER_COLORS: &[&str] = &[
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#008080",
];

pub fn pick_user_color() -> String {
    let mut rng = rand::thread_rng();
    USER_COLORS
        .choose(&mut rng)
        .expect("color palette is non-empty")
        .to_string()
}
