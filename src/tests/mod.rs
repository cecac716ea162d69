mod test_utils;

mod test_forward;
mod test_three_link;
